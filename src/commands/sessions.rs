use anyhow::Result;

use crate::commands::CommandReport;
use crate::linker::config::LinkerConfig;
use crate::linker::paths::resolve_paths;
use crate::linker::session_index::{self, SessionIndex, SessionMetadata};

fn describe(meta: &SessionMetadata) -> String {
    format!(
        "session={} name={} date_folder={}",
        meta.raw_session_token, meta.display_name, meta.date_folder
    )
}

pub fn build_report(index: &SessionIndex, token: Option<&str>) -> CommandReport {
    let mut report = CommandReport::new("sessions");
    match token {
        Some(token) => match index.get(token) {
            Some(meta) => report.detail(describe(meta)),
            None => report.issue(format!("unknown session token `{token}`")),
        },
        None => {
            if index.is_empty() {
                report.issue("session index lists no sessions");
            }
            report.detail(format!("sessions={}", index.len()));
            for meta in index.iter() {
                report.detail(describe(meta));
            }
        }
    }
    report
}

pub fn run(cfg: &LinkerConfig, token: Option<&str>) -> Result<CommandReport> {
    let paths = resolve_paths(&cfg.jurisdiction.state)?;
    let index = session_index::load(&paths.session_index_file)?;
    Ok(build_report(&index, token))
}
