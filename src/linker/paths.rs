use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

pub const QUARANTINE_SUBDIR: &str = "missing_session";

#[derive(Debug, Clone)]
pub struct LinkerPaths {
    pub linker_home: PathBuf,
    pub processed_dir: PathBuf,
    pub not_processed_dir: PathBuf,
    pub quarantine_dir: PathBuf,
    pub event_archive_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub bill_session_cache: PathBuf,
    pub session_index_file: PathBuf,
}

impl LinkerPaths {
    /// Default layout for one jurisdiction under `linker_home`, with no
    /// environment overrides applied.
    pub fn layout(linker_home: &Path, state: &str) -> Self {
        let data_output = linker_home.join("data_output").join(state);
        let not_processed_dir = data_output.join("data_not_processed");
        Self {
            linker_home: linker_home.to_path_buf(),
            processed_dir: data_output.join("data_processed"),
            quarantine_dir: not_processed_dir.join(QUARANTINE_SUBDIR),
            not_processed_dir,
            event_archive_dir: data_output.join("event_archive"),
            logs_dir: data_output.join("logs"),
            bill_session_cache: linker_home
                .join("bill_session_mapping")
                .join(format!("{state}.json")),
            session_index_file: linker_home.join("sessions").join(format!("{state}.json")),
        }
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_linker_home() -> Result<PathBuf> {
    if let Ok(v) = env::var("LINKER_HOME")
        && !v.trim().is_empty()
    {
        return Ok(PathBuf::from(v.trim()));
    }
    Ok(required_home_dir()?.join("openstates-data"))
}

pub fn resolve_paths(state: &str) -> Result<LinkerPaths> {
    let linker_home = resolve_linker_home()?;
    let defaults = LinkerPaths::layout(&linker_home, state);

    let not_processed_dir =
        env_or_default_path("LINKER_NOT_PROCESSED_DIR", defaults.not_processed_dir);
    let quarantine_dir = not_processed_dir.join(QUARANTINE_SUBDIR);

    Ok(LinkerPaths {
        processed_dir: env_or_default_path("LINKER_PROCESSED_DIR", defaults.processed_dir),
        quarantine_dir,
        not_processed_dir,
        event_archive_dir: env_or_default_path(
            "LINKER_EVENT_ARCHIVE_DIR",
            defaults.event_archive_dir,
        ),
        logs_dir: env_or_default_path("LINKER_LOGS_DIR", defaults.logs_dir),
        bill_session_cache: env_or_default_path(
            "LINKER_BILL_SESSION_CACHE",
            defaults.bill_session_cache,
        ),
        session_index_file: env_or_default_path(
            "LINKER_SESSION_INDEX",
            defaults.session_index_file,
        ),
        linker_home,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_places_quarantine_under_not_processed() {
        let paths = LinkerPaths::layout(Path::new("/data"), "usa");
        assert_eq!(
            paths.processed_dir,
            PathBuf::from("/data/data_output/usa/data_processed")
        );
        assert_eq!(
            paths.quarantine_dir,
            PathBuf::from("/data/data_output/usa/data_not_processed/missing_session")
        );
        assert_eq!(
            paths.event_archive_dir,
            PathBuf::from("/data/data_output/usa/event_archive")
        );
    }

    #[test]
    fn layout_keys_cache_and_index_by_state() {
        let paths = LinkerPaths::layout(Path::new("/data"), "il");
        assert_eq!(
            paths.bill_session_cache,
            PathBuf::from("/data/bill_session_mapping/il.json")
        );
        assert_eq!(
            paths.session_index_file,
            PathBuf::from("/data/sessions/il.json")
        );
    }
}
