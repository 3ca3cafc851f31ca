use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetireOutcome {
    pub archive_removed: bool,
    pub quarantine_removed: bool,
}

/// JSON files in the flat event archive, sorted by file name. A missing
/// archive directory simply has no events.
pub fn list_event_files(archive_dir: &Path) -> Result<Vec<PathBuf>> {
    if !archive_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    let entries = fs::read_dir(archive_dir)
        .with_context(|| format!("failed to read {}", archive_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

pub fn read_event(path: &Path) -> Result<Value> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(parsed)
}

/// Removes `path`; a file that is already gone counts as removed by someone
/// else and returns `false`.
pub fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}

/// Deletes a resolved event from the archive and its stale copy, if any, from
/// the quarantine directory.
pub fn retire_event_file(archive_file: &Path, quarantine_dir: &Path) -> Result<RetireOutcome> {
    let archive_removed = remove_if_present(archive_file)?;
    let quarantine_removed = match archive_file.file_name() {
        Some(name) => remove_if_present(&quarantine_dir.join(name))?,
        None => false,
    };
    Ok(RetireOutcome {
        archive_removed,
        quarantine_removed,
    })
}

pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn list_returns_sorted_json_files_only() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("event_b.json"), "{}").expect("b");
        fs::write(tmp.path().join("event_a.json"), "{}").expect("a");
        fs::write(tmp.path().join("notes.txt"), "x").expect("txt");
        fs::create_dir_all(tmp.path().join("nested.json")).expect("dir");

        let files = list_event_files(tmp.path()).expect("list");
        let names: Vec<_> = files.iter().map(|p| file_label(p)).collect();
        assert_eq!(names, vec!["event_a.json", "event_b.json"]);
    }

    #[test]
    fn list_on_missing_dir_is_empty() {
        let tmp = tempdir().expect("tempdir");
        assert!(list_event_files(&tmp.path().join("absent")).expect("list").is_empty());
    }

    #[test]
    fn retire_removes_archive_and_quarantine_copies() {
        let tmp = tempdir().expect("tempdir");
        let archive = tmp.path().join("event_archive");
        let quarantine = tmp.path().join("missing_session");
        fs::create_dir_all(&archive).expect("mkdir archive");
        fs::create_dir_all(&quarantine).expect("mkdir quarantine");
        fs::write(archive.join("event_42.json"), "{}").expect("archive copy");
        fs::write(quarantine.join("event_42.json"), "{}").expect("quarantine copy");

        let out = retire_event_file(&archive.join("event_42.json"), &quarantine).expect("retire");
        assert_eq!(
            out,
            RetireOutcome {
                archive_removed: true,
                quarantine_removed: true
            }
        );
        assert!(!archive.join("event_42.json").exists());
        assert!(!quarantine.join("event_42.json").exists());
    }

    #[test]
    fn retire_tolerates_missing_quarantine_and_repeat_deletion() {
        let tmp = tempdir().expect("tempdir");
        let file = tmp.path().join("event_42.json");
        fs::write(&file, "{}").expect("archive copy");

        let first = retire_event_file(&file, &tmp.path().join("missing_session")).expect("first");
        assert!(first.archive_removed);
        assert!(!first.quarantine_removed);

        let second = retire_event_file(&file, &tmp.path().join("missing_session")).expect("second");
        assert_eq!(second, RetireOutcome::default());
    }
}
