use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::error::{LinkerError, linker_error};
use crate::linker::bill_sessions::{BillDirLister, FsBillDirLister, read_cache};
use crate::linker::config::{LinkerConfig, resolve_config_path};
use crate::linker::event_archive::list_event_files;
use crate::linker::paths::resolve_paths;
use crate::linker::placement::is_placeholder;
use crate::linker::session_index;

include!(concat!(env!("OUT_DIR"), "/linker_env_allowlist.rs"));

pub fn active_env_overrides() -> Vec<&'static str> {
    GENERATED_LINKER_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env::var(key).is_ok_and(|v| !v.trim().is_empty()))
        .collect()
}

pub fn run(cfg: &LinkerConfig) -> Result<CommandReport> {
    let paths = resolve_paths(&cfg.jurisdiction.state)?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build_id={}", env!("BUILD_ID")));
    report.detail(format!("config={}", resolve_config_path()?.display()));
    report.detail(format!(
        "jurisdiction=country:{} state:{}",
        cfg.jurisdiction.country, cfg.jurisdiction.state
    ));
    report.detail(format!("linker_home={}", paths.linker_home.display()));
    report.detail(format!("processed_dir={}", paths.processed_dir.display()));
    report.detail(format!("event_archive_dir={}", paths.event_archive_dir.display()));
    report.detail(format!("quarantine_dir={}", paths.quarantine_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("bill_session_cache={}", paths.bill_session_cache.display()));
    report.detail(format!("session_index={}", paths.session_index_file.display()));
    for key in active_env_overrides() {
        report.detail(format!("env_override={key}"));
    }

    match session_index::load(&paths.session_index_file) {
        Ok(index) => report.detail(format!("sessions={}", index.len())),
        Err(err) => report.issue(format!("session index unusable: {err:#}")),
    }

    if paths.processed_dir.exists() {
        let bill_dirs = FsBillDirLister::new(&paths.processed_dir).bill_dirs()?;
        let placeholders = bill_dirs.iter().filter(|dir| is_placeholder(dir)).count();
        report.detail(format!("bill_folders={}", bill_dirs.len()));
        report.detail(format!("placeholder_bills={placeholders}"));
    } else {
        report.issue(format!(
            "missing processed archive ({})",
            paths.processed_dir.display()
        ));
    }

    match read_cache(&paths.bill_session_cache) {
        Ok(Some(map)) => report.detail(format!("cached_mapping_entries={}", map.len())),
        Ok(None) => report.detail("cached_mapping_entries=none (built on next link)"),
        Err(err) if matches!(linker_error(&err), Some(LinkerError::CorruptCache { .. })) => {
            report.issue(format!("{err:#}; run rebuild-mapping"));
        }
        Err(err) => return Err(err),
    }

    report.detail(format!(
        "archived_events={}",
        list_event_files(&paths.event_archive_dir)?.len()
    ));
    report.detail(format!(
        "quarantined_events={}",
        list_event_files(&paths.quarantine_dir)?.len()
    ));

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_covers_path_and_config_overrides() {
        for key in [
            "LINKER_HOME",
            "LINKER_CONFIG_PATH",
            "LINKER_STATE",
            "LINKER_EVENT_ARCHIVE_DIR",
            "LINKER_SESSION_INDEX",
        ] {
            assert!(GENERATED_LINKER_ENV_ALLOWLIST.contains(&key), "{key}");
        }
    }
}
