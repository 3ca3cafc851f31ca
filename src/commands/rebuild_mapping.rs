use anyhow::Result;
use std::collections::BTreeMap;

use crate::commands::CommandReport;
use crate::linker::bill_sessions::{BillSessionStore, FsBillDirLister};
use crate::linker::config::LinkerConfig;
use crate::linker::paths::resolve_paths;
use crate::linker::session_index;

pub fn run(cfg: &LinkerConfig) -> Result<CommandReport> {
    let paths = resolve_paths(&cfg.jurisdiction.state)?;
    let index = session_index::load(&paths.session_index_file)?;
    let lister = FsBillDirLister::new(&paths.processed_dir);
    let store = BillSessionStore::new(&paths.bill_session_cache, Some(&index), &lister);

    let map = store.rebuild()?;

    let mut report = CommandReport::new("rebuild-mapping");
    report.detail(format!("session_index={}", paths.session_index_file.display()));
    report.detail(format!("sessions={}", index.len()));
    report.detail(format!("processed_dir={}", paths.processed_dir.display()));
    report.detail(format!("cache={}", store.cache_path().display()));
    report.detail(format!("entries={}", map.len()));

    let mut per_session: BTreeMap<&str, usize> = BTreeMap::new();
    for session in map.values() {
        *per_session.entry(session.name.as_str()).or_default() += 1;
    }
    for (name, count) in per_session {
        report.detail(format!("session={name} bills={count}"));
    }

    if !paths.processed_dir.exists() {
        report.issue(format!(
            "processed archive not found: {}",
            paths.processed_dir.display()
        ));
    }
    Ok(report)
}
