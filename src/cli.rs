use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::commands::{self, CommandReport};
use crate::linker::config::{self, LinkerConfig};
use crate::logging;

#[derive(Debug, Parser)]
#[command(
    name = "openstates-linker",
    version,
    about = "Link archived OpenStates events to the bills they reference"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the two-pass event linking pipeline.
    Link {
        /// Jurisdiction state code, overriding config.
        #[arg(long)]
        state: Option<String>,
        /// Rebuild the bill-session mapping before the first pass.
        #[arg(long)]
        rebuild: bool,
    },
    /// Rescan the processed archive and rewrite the bill-session cache.
    RebuildMapping {
        #[arg(long)]
        state: Option<String>,
    },
    /// Print the bill identifiers an event file references.
    Extract { file: PathBuf },
    /// List the session index, or look up one raw session token.
    Sessions {
        #[arg(long)]
        state: Option<String>,
        token: Option<String>,
    },
    /// Show resolved paths, cache state and active overrides.
    Status {
        #[arg(long)]
        state: Option<String>,
    },
}

impl Command {
    fn state_override(&self) -> Option<&str> {
        match self {
            Self::Link { state, .. }
            | Self::RebuildMapping { state }
            | Self::Sessions { state, .. }
            | Self::Status { state } => state.as_deref(),
            Self::Extract { .. } => None,
        }
    }
}

fn load_config(state_override: Option<&str>) -> Result<LinkerConfig> {
    let mut cfg = config::load_config()?;
    if let Some(state) = state_override {
        cfg.jurisdiction.state = state.trim().to_string();
        config::validate(&cfg)?;
    }
    Ok(cfg)
}

fn render_text(report: &CommandReport) -> String {
    let mut out = format!(
        "{}: {}\n",
        report.command,
        if report.ok { "ok" } else { "failed" }
    );
    for detail in &report.details {
        out.push_str(&format!("  {detail}\n"));
    }
    for issue in &report.issues {
        out.push_str(&format!("  issue: {issue}\n"));
    }
    out
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render_text(report));
    }
    Ok(())
}

pub fn run(dotenv: Option<&Path>) -> Result<bool> {
    let cli = Cli::parse();
    let cfg = load_config(cli.command.state_override())?;
    if let Err(err) = logging::init_logging(&cfg.logging) {
        eprintln!("warning: {err}");
    }
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let report = match &cli.command {
        Command::Link { rebuild, .. } => commands::link::run(
            &cfg,
            &commands::link::LinkOptions { rebuild: *rebuild },
        )?,
        Command::RebuildMapping { .. } => commands::rebuild_mapping::run(&cfg)?,
        Command::Extract { file } => commands::extract::run(file)?,
        Command::Sessions { token, .. } => commands::sessions::run(&cfg, token.as_deref())?,
        Command::Status { .. } => commands::status::run(&cfg)?,
    };

    print_report(&report, cli.json)?;
    Ok(report.ok)
}
