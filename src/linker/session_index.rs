//! Static lookup from a raw session token (as it appears in scraped records)
//! to the display name and date-range folder used in the processed archive.
//!
//! Entries keep the order of the backing JSON file. Display-name lookups scan
//! that order and return the first hit, so two sessions sharing a display name
//! resolve to whichever is listed first.

use crate::error::LinkerError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub raw_session_token: String,
    pub display_name: String,
    pub date_folder: String,
}

#[derive(Debug, Clone, Default)]
pub struct SessionIndex {
    entries: Vec<SessionMetadata>,
}

fn required_str(entry: &Value, field: &str, token: &str) -> Result<String> {
    match entry.get(field).and_then(Value::as_str) {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(LinkerError::Configuration(format!(
            "session `{token}` is missing a non-empty `{field}`"
        ))
        .into()),
    }
}

impl SessionIndex {
    pub fn from_entries(entries: Vec<SessionMetadata>) -> Self {
        Self { entries }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: Value = serde_json::from_str(raw)
            .map_err(|err| LinkerError::Configuration(format!("session index is not JSON: {err}")))?;
        let Value::Object(object) = parsed else {
            return Err(LinkerError::Configuration(
                "session index must be a JSON object keyed by session token".to_string(),
            )
            .into());
        };

        let mut entries = Vec::with_capacity(object.len());
        for (token, entry) in &object {
            entries.push(SessionMetadata {
                raw_session_token: token.clone(),
                display_name: required_str(entry, "name", token)?,
                date_folder: required_str(entry, "date_folder", token)?,
            });
        }
        Ok(Self::from_entries(entries))
    }

    pub fn get(&self, token: &str) -> Option<&SessionMetadata> {
        self.entries.iter().find(|m| m.raw_session_token == token)
    }

    pub fn find_by_display_name(&self, display_name: &str) -> Option<&SessionMetadata> {
        self.entries.iter().find(|m| m.display_name == display_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionMetadata> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn load(path: &Path) -> Result<SessionIndex> {
    if !path.exists() {
        return Err(LinkerError::Configuration(format!(
            "session index file not found: {}",
            path.display()
        ))
        .into());
    }

    let raw = fs::read_to_string(path).map_err(|err| {
        LinkerError::Configuration(format!("failed to read {}: {err}", path.display()))
    })?;
    let index = SessionIndex::from_json(&raw)
        .with_context(|| format!("invalid session index {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        sessions = index.len(),
        "loaded session index"
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::linker_error;
    use tempfile::tempdir;

    fn is_configuration_error(err: &anyhow::Error) -> bool {
        matches!(linker_error(err), Some(LinkerError::Configuration(_)))
    }

    #[test]
    fn load_reads_tokens_in_file_order() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("usa.json");
        fs::write(
            &path,
            r#"{
  "119": {"name": "119th Congress", "date_folder": "2025-2026"},
  "118": {"name": "118th Congress", "date_folder": "2023-2024"}
}"#,
        )
        .expect("write index");

        let index = load(&path).expect("load");
        let tokens: Vec<_> = index.iter().map(|m| m.raw_session_token.as_str()).collect();
        assert_eq!(tokens, vec!["119", "118"]);
        assert_eq!(
            index.get("118").map(|m| m.date_folder.as_str()),
            Some("2023-2024")
        );
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let tmp = tempdir().expect("tempdir");
        let err = load(&tmp.path().join("absent.json")).unwrap_err();
        assert!(is_configuration_error(&err));
    }

    #[test]
    fn non_object_top_level_is_configuration_error() {
        let err = SessionIndex::from_json("[1, 2, 3]").unwrap_err();
        assert!(is_configuration_error(&err));
    }

    #[test]
    fn entry_without_date_folder_is_rejected() {
        let err = SessionIndex::from_json(r#"{"119": {"name": "119th Congress"}}"#).unwrap_err();
        assert!(is_configuration_error(&err));
        assert!(format!("{err}").contains("date_folder"));
    }

    #[test]
    fn duplicate_display_names_resolve_to_first_listed() {
        let index = SessionIndex::from_json(
            r#"{
  "2023A": {"name": "2023 Session", "date_folder": "2023-2023"},
  "2023B": {"name": "2023 Session", "date_folder": "2023-2024"}
}"#,
        )
        .expect("parse");
        let hit = index.find_by_display_name("2023 Session").expect("hit");
        assert_eq!(hit.raw_session_token, "2023A");
        assert_eq!(hit.date_folder, "2023-2023");
    }
}
