//! Writes a resolved event into its bill's folder in the processed archive.
//!
//! Layout under the processed root:
//! `country:<c>/state:<s>/sessions/ocd-session/country:<c>/state:<s>/<date_folder>/<session>/bills/<bill>/{logs,files}`
//! with the event stored as `logs/<YYYYMMDDTHHMMSSZ>_<slug>.json`.

use crate::error::LinkerError;
use crate::linker::config::JurisdictionConfig;
use crate::linker::util::{format_timestamp, slugify_event_name};
use anyhow::{Context, Result};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const PLACEHOLDER_FILE: &str = "placeholder.json";

#[derive(Debug, Clone, Copy)]
pub struct PlacementRequest<'a> {
    pub jurisdiction: &'a JurisdictionConfig,
    pub event: &'a Value,
    pub session_name: &'a str,
    pub date_folder: &'a str,
    pub processed_root: &'a Path,
    pub bill_id: &'a str,
    pub source_file: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedEvent {
    pub path: PathBuf,
    /// Hex sha256 of the stored event file.
    pub sha256: String,
}

pub trait EventPlacer {
    /// Stores the event and reports where it landed. Failures carry a
    /// [`LinkerError::Placement`].
    fn place(&self, req: &PlacementRequest<'_>) -> Result<PlacedEvent>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsEventPlacer;

pub fn bill_dir(
    processed_root: &Path,
    jurisdiction: &JurisdictionConfig,
    date_folder: &str,
    session_name: &str,
    bill_id: &str,
) -> PathBuf {
    let country = format!("country:{}", jurisdiction.country);
    let state = format!("state:{}", jurisdiction.state);
    processed_root
        .join(&country)
        .join(&state)
        .join("sessions")
        .join("ocd-session")
        .join(&country)
        .join(&state)
        .join(date_folder)
        .join(session_name)
        .join("bills")
        .join(bill_id)
}

fn is_path_segment(value: &str) -> bool {
    !value.trim().is_empty() && value != "." && value != ".." && !value.contains(['/', '\\'])
}

fn placement_error(message: impl Into<String>) -> anyhow::Error {
    LinkerError::Placement(message.into()).into()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Drops the placeholder marker into a freshly created bill folder. An
/// existing marker is left untouched; returns whether one was written.
pub fn ensure_placeholder(bill_dir: &Path, bill_id: &str) -> Result<bool> {
    let path = bill_dir.join(PLACEHOLDER_FILE);
    let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to create {}", path.display()));
        }
    };
    let body = serde_json::to_string_pretty(&json!({
        "identifier": bill_id,
        "placeholder": true,
    }))?;
    file.write_all(format!("{body}\n").as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(bill = bill_id, "created placeholder for missing bill");
    Ok(true)
}

pub fn is_placeholder(bill_dir: &Path) -> bool {
    let Ok(raw) = fs::read_to_string(bill_dir.join(PLACEHOLDER_FILE)) else {
        return false;
    };
    serde_json::from_str::<Value>(&raw)
        .ok()
        .and_then(|v| v.get("placeholder").and_then(Value::as_bool))
        .unwrap_or(false)
}

fn event_file_name(event: &Value) -> Result<String> {
    let start_date = event
        .get("start_date")
        .and_then(Value::as_str)
        .ok_or_else(|| placement_error("event is missing start_date"))?;
    let timestamp = format_timestamp(start_date)
        .ok_or_else(|| placement_error(format!("unparsable start_date `{start_date}`")))?;
    let name = event.get("name").and_then(Value::as_str).unwrap_or("event");
    Ok(format!("{timestamp}_{}.json", slugify_event_name(name)))
}

fn write_event_file(logs_dir: &Path, target: &Path, body: &[u8]) -> Result<()> {
    if target.exists() {
        let existing =
            fs::read(target).with_context(|| format!("failed to read {}", target.display()))?;
        if existing == body {
            return Ok(());
        }
        return Err(placement_error(format!(
            "refusing to overwrite {} with different content",
            target.display()
        )));
    }

    let mut tmp = tempfile::Builder::new()
        .prefix(".event-")
        .suffix(".tmp")
        .tempfile_in(logs_dir)
        .with_context(|| format!("failed to create temp file in {}", logs_dir.display()))?;
    tmp.write_all(body)
        .with_context(|| format!("failed to write temp file for {}", target.display()))?;
    tmp.persist_noclobber(target)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(())
}

fn place_event(req: &PlacementRequest<'_>) -> Result<PlacedEvent> {
    for (what, value) in [
        ("bill identifier", req.bill_id),
        ("session name", req.session_name),
        ("date folder", req.date_folder),
    ] {
        if !is_path_segment(value) {
            return Err(placement_error(format!(
                "{what} `{value}` cannot be used as a folder name"
            )));
        }
    }

    let file_name = event_file_name(req.event)?;
    let body = format!("{}\n", serde_json::to_string_pretty(req.event)?);

    let dir = bill_dir(
        req.processed_root,
        req.jurisdiction,
        req.date_folder,
        req.session_name,
        req.bill_id,
    );
    let existed = dir.is_dir();
    let logs_dir = dir.join("logs");
    fs::create_dir_all(&logs_dir)
        .with_context(|| format!("failed to create {}", logs_dir.display()))?;
    fs::create_dir_all(dir.join("files"))
        .with_context(|| format!("failed to create {}", dir.join("files").display()))?;

    let target = logs_dir.join(file_name);
    let written = if existed {
        write_event_file(&logs_dir, &target, body.as_bytes())
    } else {
        ensure_placeholder(&dir, req.bill_id)
            .and_then(|_| write_event_file(&logs_dir, &target, body.as_bytes()))
    };

    if let Err(err) = written {
        if !existed {
            let _ = fs::remove_dir_all(&dir);
        }
        return Err(err);
    }
    Ok(PlacedEvent {
        path: target,
        sha256: sha256_hex(body.as_bytes()),
    })
}

impl EventPlacer for FsEventPlacer {
    fn place(&self, req: &PlacementRequest<'_>) -> Result<PlacedEvent> {
        place_event(req).map_err(|err| {
            if matches!(
                crate::error::linker_error(&err),
                Some(LinkerError::Placement(_))
            ) {
                err
            } else {
                LinkerError::Placement(format!("{}: {err:#}", req.source_file)).into()
            }
        })
    }
}
