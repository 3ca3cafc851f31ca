//! Bill identifier → session mapping.
//!
//! The mapping is derived from the processed archive: every directory directly
//! under a `bills` folder is a bill, and the folder two levels above it names
//! the session. A cached copy is kept on disk so a run that does not need a
//! rebuild can skip the scan; the archive itself is always authoritative.

use crate::error::LinkerError;
use crate::linker::session_index::SessionIndex;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const BILLS_SEGMENT: &str = "bills";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillSession {
    pub name: String,
    pub date_folder: String,
}

pub type BillSessionMap = BTreeMap<String, BillSession>;

/// Source of candidate bill directories for a rebuild.
pub trait BillDirLister {
    fn bill_dirs(&self) -> Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone)]
pub struct FsBillDirLister {
    root: PathBuf,
}

impl FsBillDirLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        // Symlinked directories are not followed.
        if entry.file_type()?.is_dir() {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

fn collect_bill_dirs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for child in sorted_subdirs(dir)? {
        if child.file_name().and_then(|n| n.to_str()) == Some(BILLS_SEGMENT) {
            out.extend(sorted_subdirs(&child)?);
        } else {
            collect_bill_dirs(&child, out)?;
        }
    }
    Ok(())
}

impl BillDirLister for FsBillDirLister {
    fn bill_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        if self.root.is_dir() {
            collect_bill_dirs(&self.root, &mut out)?;
        }
        Ok(out)
    }
}

fn name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Matches each bill directory's session folder against the index.
///
/// Directories whose session folder has no matching display name are left out.
/// When the same identifier shows up under two sessions the later directory in
/// `dirs` wins.
pub fn rebuild_from_dirs(dirs: &[PathBuf], index: &SessionIndex) -> BillSessionMap {
    let mut out = BillSessionMap::new();
    for dir in dirs {
        let Some(bill_id) = name_of(dir) else {
            continue;
        };
        let Some(bills_dir) = dir.parent() else {
            continue;
        };
        if name_of(bills_dir) != Some(BILLS_SEGMENT) {
            continue;
        }
        let Some(session_folder) = bills_dir.parent().and_then(name_of) else {
            continue;
        };
        let Some(meta) = index.find_by_display_name(session_folder) else {
            tracing::trace!(bill = bill_id, session_folder, "no session matches folder");
            continue;
        };
        out.insert(
            bill_id.to_string(),
            BillSession {
                name: meta.display_name.clone(),
                date_folder: meta.date_folder.clone(),
            },
        );
    }
    out
}

pub fn read_cache(path: &Path) -> Result<Option<BillSessionMap>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = serde_json::from_slice(&raw).map_err(|err| LinkerError::CorruptCache {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    Ok(Some(parsed))
}

/// Writes the cache through a temp file in the same directory so readers never
/// see a partially written mapping.
pub fn write_cache(path: &Path, map: &BillSessionMap) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;

    let data = serde_json::to_string_pretty(map)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".bill-sessions-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(format!("{data}\n").as_bytes())
        .with_context(|| format!("failed to write temp cache for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("failed to sync temp cache for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub struct BillSessionStore<'a> {
    cache_path: PathBuf,
    index: Option<&'a SessionIndex>,
    lister: &'a dyn BillDirLister,
}

impl<'a> BillSessionStore<'a> {
    pub fn new(
        cache_path: impl Into<PathBuf>,
        index: Option<&'a SessionIndex>,
        lister: &'a dyn BillDirLister,
    ) -> Self {
        Self {
            cache_path: cache_path.into(),
            index,
            lister,
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Returns the cached mapping unless `force_rebuild` is set or no cache
    /// exists, in which case the archive is rescanned and the cache rewritten.
    pub fn load(&self, force_rebuild: bool) -> Result<BillSessionMap> {
        if !force_rebuild && let Some(cached) = read_cache(&self.cache_path)? {
            tracing::debug!(
                path = %self.cache_path.display(),
                entries = cached.len(),
                "loaded bill-session mapping from cache"
            );
            return Ok(cached);
        }
        self.rebuild()
    }

    pub fn rebuild(&self) -> Result<BillSessionMap> {
        let Some(index) = self.index else {
            return Err(LinkerError::Configuration(
                "session index is required to rebuild the bill-session mapping".to_string(),
            )
            .into());
        };

        let dirs = self.lister.bill_dirs()?;
        let map = rebuild_from_dirs(&dirs, index);
        write_cache(&self.cache_path, &map)?;
        tracing::info!(
            scanned = dirs.len(),
            entries = map.len(),
            path = %self.cache_path.display(),
            "rebuilt bill-session mapping"
        );
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::linker_error;
    use crate::linker::session_index::SessionMetadata;
    use std::cell::Cell;
    use tempfile::tempdir;

    struct FakeLister {
        dirs: Vec<PathBuf>,
        calls: Cell<usize>,
    }

    impl FakeLister {
        fn new(dirs: &[&str]) -> Self {
            Self {
                dirs: dirs.iter().map(PathBuf::from).collect(),
                calls: Cell::new(0),
            }
        }
    }

    impl BillDirLister for FakeLister {
        fn bill_dirs(&self) -> Result<Vec<PathBuf>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.dirs.clone())
        }
    }

    fn congress_index() -> SessionIndex {
        SessionIndex::from_entries(vec![
            SessionMetadata {
                raw_session_token: "118".to_string(),
                display_name: "118th Congress".to_string(),
                date_folder: "2021-2022".to_string(),
            },
            SessionMetadata {
                raw_session_token: "119".to_string(),
                display_name: "119th Congress".to_string(),
                date_folder: "2023-2024".to_string(),
            },
        ])
    }

    fn session(name: &str, date_folder: &str) -> BillSession {
        BillSession {
            name: name.to_string(),
            date_folder: date_folder.to_string(),
        }
    }

    #[test]
    fn rebuild_maps_bill_to_enclosing_session() {
        let dirs = vec![PathBuf::from(
            "/out/country:us/state:usa/sessions/ocd-session/country:us/state:usa/2023-2024/119th Congress/bills/HR1",
        )];
        let map = rebuild_from_dirs(&dirs, &congress_index());
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("HR1"), Some(&session("119th Congress", "2023-2024")));
    }

    #[test]
    fn rebuild_drops_unmatched_session_folders() {
        let dirs = vec![
            PathBuf::from("/out/2023-2024/119th Congress/bills/HR1"),
            PathBuf::from("/out/1999-2000/106th Congress/bills/HR7"),
        ];
        let map = rebuild_from_dirs(&dirs, &congress_index());
        assert!(map.contains_key("HR1"));
        assert!(!map.contains_key("HR7"));
    }

    #[test]
    fn rebuild_ignores_paths_not_directly_under_bills() {
        let dirs = vec![PathBuf::from("/out/2023-2024/119th Congress/events/HR1")];
        assert!(rebuild_from_dirs(&dirs, &congress_index()).is_empty());
    }

    #[test]
    fn rebuild_last_scanned_session_wins_for_duplicate_ids() {
        let dirs = vec![
            PathBuf::from("/out/2021-2022/118th Congress/bills/HR1"),
            PathBuf::from("/out/2023-2024/119th Congress/bills/HR1"),
        ];
        let map = rebuild_from_dirs(&dirs, &congress_index());
        assert_eq!(map.get("HR1"), Some(&session("119th Congress", "2023-2024")));
    }

    #[test]
    fn load_without_cache_rebuilds_and_persists() {
        let tmp = tempdir().expect("tempdir");
        let cache = tmp.path().join("mapping/usa.json");
        let index = congress_index();
        let lister = FakeLister::new(&["/out/2023-2024/119th Congress/bills/HR1"]);

        let store = BillSessionStore::new(&cache, Some(&index), &lister);
        let built = store.load(false).expect("load");
        assert_eq!(lister.calls.get(), 1);
        assert!(cache.exists());

        let again = store.load(false).expect("cached load");
        assert_eq!(lister.calls.get(), 1);
        assert_eq!(again, built);
    }

    #[test]
    fn force_rebuild_ignores_existing_cache() {
        let tmp = tempdir().expect("tempdir");
        let cache = tmp.path().join("usa.json");
        fs::write(&cache, r#"{"STALE": {"name": "old", "date_folder": "1990-1991"}}"#)
            .expect("write stale cache");
        let index = congress_index();
        let lister = FakeLister::new(&["/out/2023-2024/119th Congress/bills/HR1"]);

        let store = BillSessionStore::new(&cache, Some(&index), &lister);
        let map = store.load(true).expect("rebuild");
        assert!(!map.contains_key("STALE"));
        assert!(map.contains_key("HR1"));

        let persisted = read_cache(&cache).expect("read").expect("some");
        assert_eq!(persisted, map);
    }

    #[test]
    fn cached_mapping_is_returned_verbatim_without_index() {
        let tmp = tempdir().expect("tempdir");
        let cache = tmp.path().join("usa.json");
        fs::write(&cache, r#"{"SB 5": {"name": "2025 Regular", "date_folder": "2025-2025"}}"#)
            .expect("write cache");
        let lister = FakeLister::new(&[]);

        let store = BillSessionStore::new(&cache, None, &lister);
        let map = store.load(false).expect("load");
        assert_eq!(map.get("SB 5"), Some(&session("2025 Regular", "2025-2025")));
        assert_eq!(lister.calls.get(), 0);
    }

    #[test]
    fn corrupt_cache_surfaces_typed_error() {
        let tmp = tempdir().expect("tempdir");
        let cache = tmp.path().join("usa.json");
        fs::write(&cache, "{not json").expect("write cache");
        let lister = FakeLister::new(&[]);

        let store = BillSessionStore::new(&cache, None, &lister);
        let err = store.load(false).unwrap_err();
        assert!(matches!(
            linker_error(&err),
            Some(LinkerError::CorruptCache { .. })
        ));
    }

    #[test]
    fn non_utf8_cache_surfaces_typed_error() {
        let tmp = tempdir().expect("tempdir");
        let cache = tmp.path().join("usa.json");
        fs::write(&cache, [0xff, 0xfe, 0x7b]).expect("write cache");
        let lister = FakeLister::new(&[]);

        let store = BillSessionStore::new(&cache, None, &lister);
        let err = store.load(false).unwrap_err();
        assert!(matches!(
            linker_error(&err),
            Some(LinkerError::CorruptCache { .. })
        ));
    }

    #[test]
    fn rebuild_without_index_is_configuration_error() {
        let tmp = tempdir().expect("tempdir");
        let lister = FakeLister::new(&[]);
        let store = BillSessionStore::new(tmp.path().join("usa.json"), None, &lister);
        let err = store.load(true).unwrap_err();
        assert!(matches!(
            linker_error(&err),
            Some(LinkerError::Configuration(_))
        ));
        assert!(!tmp.path().join("usa.json").exists());
    }

    #[test]
    fn fs_lister_finds_bill_dirs_and_skips_files() {
        let tmp = tempdir().expect("tempdir");
        let session = tmp.path().join("country:us/state:usa/sessions/ocd-session/country:us/state:usa/2023-2024/119th Congress");
        fs::create_dir_all(session.join("bills/HR1/logs")).expect("mkdir HR1");
        fs::create_dir_all(session.join("bills/HR2/files")).expect("mkdir HR2");
        fs::create_dir_all(session.join("events")).expect("mkdir events");
        fs::write(session.join("bills/README.json"), "{}").expect("write stray file");

        let dirs = FsBillDirLister::new(tmp.path()).bill_dirs().expect("list");
        let names: Vec<_> = dirs.iter().filter_map(|d| name_of(d)).collect();
        assert_eq!(names, vec!["HR1", "HR2"]);
    }

    #[test]
    fn fs_lister_on_missing_root_is_empty() {
        let tmp = tempdir().expect("tempdir");
        let dirs = FsBillDirLister::new(tmp.path().join("nope"))
            .bill_dirs()
            .expect("list");
        assert!(dirs.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn fs_lister_does_not_follow_symlinked_dirs() {
        let tmp = tempdir().expect("tempdir");
        let session = tmp.path().join("2023-2024/119th Congress");
        fs::create_dir_all(session.join("bills/HR1")).expect("mkdir HR1");
        std::os::unix::fs::symlink(tmp.path(), session.join("loop")).expect("symlink cycle");
        std::os::unix::fs::symlink(session.join("bills/HR1"), session.join("bills/HR1-alias"))
            .expect("symlink bill");

        let dirs = FsBillDirLister::new(tmp.path()).bill_dirs().expect("list");
        let names: Vec<_> = dirs.iter().filter_map(|d| name_of(d)).collect();
        assert_eq!(names, vec!["HR1"]);
    }
}
