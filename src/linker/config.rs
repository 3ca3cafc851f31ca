use crate::error::LinkerError;
use crate::linker::paths::resolve_linker_home;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JurisdictionConfig {
    pub country: String,
    pub state: String,
}

impl Default for JurisdictionConfig {
    fn default() -> Self {
        Self {
            country: "us".to_string(),
            state: "usa".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LinkingConfig {
    #[serde(default)]
    pub rebuild_on_start: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LinkerConfig {
    pub jurisdiction: JurisdictionConfig,
    pub linking: LinkingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLinkerConfig {
    jurisdiction: Option<JurisdictionConfig>,
    linking: Option<LinkingConfig>,
    logging: Option<LoggingConfig>,
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn is_path_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', ':'])
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    LinkerError::Configuration(message.into()).into()
}

pub fn validate(cfg: &LinkerConfig) -> Result<()> {
    if !is_path_segment(&cfg.jurisdiction.country) {
        return Err(invalid(format!(
            "invalid jurisdiction country `{}`: must be a single path segment",
            cfg.jurisdiction.country
        )));
    }
    if !is_path_segment(&cfg.jurisdiction.state) {
        return Err(invalid(format!(
            "invalid jurisdiction state `{}`: must be a single path segment",
            cfg.jurisdiction.state
        )));
    }
    if cfg.logging.level.trim().is_empty() {
        return Err(invalid("invalid log level: cannot be empty"));
    }
    Ok(())
}

pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(custom) = env::var("LINKER_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }
    Ok(resolve_linker_home()?.join("linker.toml"))
}

fn merge_file_config(base: &mut LinkerConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| invalid(format!("failed to read {}: {err}", path.display())))?;
    let parsed: PartialLinkerConfig = toml::from_str(&raw)
        .map_err(|err| invalid(format!("failed to parse linker config {}: {err}", path.display())))?;
    if let Some(jurisdiction) = parsed.jurisdiction {
        base.jurisdiction = jurisdiction;
    }
    if let Some(linking) = parsed.linking {
        base.linking = linking;
    }
    if let Some(logging) = parsed.logging {
        base.logging = logging;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut LinkerConfig) -> Result<()> {
    cfg.jurisdiction.country = env_or_string("LINKER_COUNTRY", &cfg.jurisdiction.country);
    cfg.jurisdiction.state = env_or_string("LINKER_STATE", &cfg.jurisdiction.state);
    cfg.linking.rebuild_on_start =
        env_or_bool("LINKER_REBUILD_ON_START", cfg.linking.rebuild_on_start);
    cfg.logging.level = env_or_string("LINKER_LOG_LEVEL", &cfg.logging.level);
    if let Ok(raw) = env::var("LINKER_LOG_FORMAT")
        && !raw.trim().is_empty()
    {
        cfg.logging.format = LogFormat::parse(&raw)
            .ok_or_else(|| invalid(format!("invalid LINKER_LOG_FORMAT `{raw}`: use pretty or json")))?;
    }
    Ok(())
}

pub fn load_config() -> Result<LinkerConfig> {
    let mut cfg = LinkerConfig::default();
    merge_file_config(&mut cfg, &resolve_config_path()?)?;
    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;
    Ok(cfg)
}
