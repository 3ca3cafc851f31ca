//! Two-pass linking of archived events to the bills they reference.
//!
//! Pass 1 works from the cached (or freshly built) bill-session mapping. Events
//! with bill references that match nothing are deferred; if there are any, the
//! mapping is rebuilt from the processed archive and the deferred events get
//! exactly one more attempt. An event is linked to the first of its referenced
//! bills found in the mapping and no other. Linked events are removed from the
//! archive and from quarantine; everything else stays where it is.

use crate::error::{LinkerError, LinkerErrorCode, error_code, linker_error};
use crate::linker::bill_sessions::{BillDirLister, BillSessionMap, BillSessionStore};
use crate::linker::config::JurisdictionConfig;
use crate::linker::event_archive::{file_label, list_event_files, read_event, retire_event_file};
use crate::linker::extract::extract_bill_ids;
use crate::linker::paths::LinkerPaths;
use crate::linker::placement::{EventPlacer, PlacedEvent, PlacementRequest};
use crate::linker::session_index::{self, SessionIndex};
use crate::linker::warn::{self, WarnEvent};
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    pub jurisdiction: &'a JurisdictionConfig,
    pub paths: &'a LinkerPaths,
    pub rebuild_on_start: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    First,
    Second,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedEvent {
    pub file: String,
    pub bill_id: String,
    pub placed_path: String,
    pub sha256: String,
    pub pass: Pass,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkOutcome {
    pub mapping_entries: usize,
    pub scanned: usize,
    pub resolved_first_pass: usize,
    pub resolved_second_pass: usize,
    pub deferred: usize,
    pub skipped_without_bills: usize,
    pub malformed: usize,
    pub placement_failed: usize,
    pub cleanup_failed: usize,
    pub quarantine_removed: usize,
    pub rebuilt_for_second_pass: bool,
    pub resolved: Vec<ResolvedEvent>,
    pub still_unresolved: Vec<String>,
}

impl LinkOutcome {
    pub fn resolved_total(&self) -> usize {
        self.resolved_first_pass + self.resolved_second_pass
    }
}

#[derive(Debug, Clone)]
struct Deferred {
    file: PathBuf,
    bill_ids: Vec<String>,
}

enum Attempt {
    Resolved,
    Unmatched,
    Failed,
}

fn warn_record(code: &str, action: &str, file: &Path, bill: &str, reason: &str, err: &str) {
    warn::emit(WarnEvent {
        code,
        stage: "link",
        action,
        file: &file_label(file),
        bill,
        retry: "next-run",
        reason,
        err,
    });
}

fn load_mapping(store: &BillSessionStore<'_>, force_rebuild: bool) -> Result<BillSessionMap> {
    match store.load(force_rebuild) {
        Ok(map) => Ok(map),
        Err(err) if matches!(linker_error(&err), Some(LinkerError::CorruptCache { .. })) => {
            warn::emit(WarnEvent {
                code: error_code(&err),
                stage: "mapping",
                action: "load-cache",
                file: &store.cache_path().display().to_string(),
                bill: "",
                retry: "rebuild-now",
                reason: "corrupt-cache",
                err: &format!("{err:#}"),
            });
            store.rebuild()
        }
        Err(err) => Err(err),
    }
}

/// Identifiers of a readable, well-formed event; `None` when the event has to
/// be skipped for this run.
fn read_candidate(file: &Path, outcome: &mut LinkOutcome) -> Option<(Value, Vec<String>)> {
    let event = match read_event(file) {
        Ok(event) => event,
        Err(err) => {
            outcome.malformed += 1;
            warn_record(
                LinkerErrorCode::E003MalformedRecord.as_str(),
                "read-event",
                file,
                "",
                "unreadable-event-file",
                &format!("{err:#}"),
            );
            return None;
        }
    };
    match extract_bill_ids(&event) {
        Ok(ids) => Some((event, ids)),
        Err(err) => {
            outcome.malformed += 1;
            warn_record(
                err.code().as_str(),
                "extract-bill-ids",
                file,
                "",
                "malformed-agenda",
                &err.to_string(),
            );
            None
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn attempt(
    ctx: &LinkContext<'_>,
    mapping: &BillSessionMap,
    placer: &dyn EventPlacer,
    file: &Path,
    event: &Value,
    bill_ids: &[String],
    pass: Pass,
    outcome: &mut LinkOutcome,
) -> Attempt {
    let Some((bill_id, session)) = bill_ids
        .iter()
        .find_map(|id| mapping.get(id).map(|session| (id, session)))
    else {
        return Attempt::Unmatched;
    };

    let label = file_label(file);
    let placed = placer.place(&PlacementRequest {
        jurisdiction: ctx.jurisdiction,
        event,
        session_name: &session.name,
        date_folder: &session.date_folder,
        processed_root: &ctx.paths.processed_dir,
        bill_id,
        source_file: &label,
    });
    let PlacedEvent { path, sha256 } = match placed {
        Ok(placed) => placed,
        Err(err) => {
            outcome.placement_failed += 1;
            warn_record(
                error_code(&err),
                "place-event",
                file,
                bill_id,
                "placement-failed",
                &format!("{err:#}"),
            );
            return Attempt::Failed;
        }
    };

    match retire_event_file(file, &ctx.paths.quarantine_dir) {
        Ok(retired) => {
            if !retired.archive_removed {
                tracing::debug!(file = %label, "archived event was already removed");
            }
            if retired.quarantine_removed {
                outcome.quarantine_removed += 1;
            }
        }
        Err(err) => {
            outcome.cleanup_failed += 1;
            warn_record(
                LinkerErrorCode::E004Placement.as_str(),
                "retire-event",
                file,
                bill_id,
                "archive-cleanup-failed",
                &format!("{err:#}"),
            );
        }
    }

    tracing::info!(file = %label, bill = %bill_id, session = %session.name, "linked event to bill");
    outcome.resolved.push(ResolvedEvent {
        file: label,
        bill_id: bill_id.clone(),
        placed_path: path.display().to_string(),
        sha256,
        pass,
    });
    Attempt::Resolved
}

/// Runs both passes against the given session index.
pub fn link_with_index(
    ctx: &LinkContext<'_>,
    index: &SessionIndex,
    lister: &dyn BillDirLister,
    placer: &dyn EventPlacer,
) -> Result<LinkOutcome> {
    let store = BillSessionStore::new(&ctx.paths.bill_session_cache, Some(index), lister);
    let mut mapping = load_mapping(&store, ctx.rebuild_on_start)?;
    let mut outcome = LinkOutcome {
        mapping_entries: mapping.len(),
        ..LinkOutcome::default()
    };
    tracing::info!(entries = mapping.len(), "loaded bill-session mapping");

    let mut deferred = Vec::new();
    for file in list_event_files(&ctx.paths.event_archive_dir)? {
        outcome.scanned += 1;
        let Some((event, bill_ids)) = read_candidate(&file, &mut outcome) else {
            continue;
        };
        if bill_ids.is_empty() {
            outcome.skipped_without_bills += 1;
            continue;
        }
        match attempt(ctx, &mapping, placer, &file, &event, &bill_ids, Pass::First, &mut outcome) {
            Attempt::Resolved => outcome.resolved_first_pass += 1,
            Attempt::Unmatched => deferred.push(Deferred { file, bill_ids }),
            Attempt::Failed => {}
        }
    }

    outcome.deferred = deferred.len();
    if deferred.is_empty() {
        return Ok(outcome);
    }

    tracing::info!(deferred = deferred.len(), "rebuilding mapping for second pass");
    mapping = store.rebuild()?;
    outcome.rebuilt_for_second_pass = true;
    outcome.mapping_entries = mapping.len();

    for Deferred { file, bill_ids } in deferred {
        if !file.exists() {
            tracing::debug!(file = %file_label(&file), "deferred event already removed");
            continue;
        }
        let event = match read_event(&file) {
            Ok(event) => event,
            Err(err) => {
                outcome.malformed += 1;
                warn_record(
                    LinkerErrorCode::E003MalformedRecord.as_str(),
                    "reread-event",
                    &file,
                    "",
                    "unreadable-event-file",
                    &format!("{err:#}"),
                );
                continue;
            }
        };
        match attempt(ctx, &mapping, placer, &file, &event, &bill_ids, Pass::Second, &mut outcome) {
            Attempt::Resolved => outcome.resolved_second_pass += 1,
            Attempt::Unmatched => {
                tracing::info!(
                    file = %file_label(&file),
                    bills = %bill_ids.join(","),
                    "event still unresolved"
                );
                outcome.still_unresolved.push(file_label(&file));
            }
            Attempt::Failed => {}
        }
    }

    Ok(outcome)
}

/// Loads the session index named by `ctx.paths` and runs both passes.
pub fn link_events(
    ctx: &LinkContext<'_>,
    lister: &dyn BillDirLister,
    placer: &dyn EventPlacer,
) -> Result<LinkOutcome> {
    let index = session_index::load(&ctx.paths.session_index_file)?;
    let outcome = link_with_index(ctx, &index, lister, placer)?;
    tracing::info!(
        resolved = outcome.resolved_total(),
        still_unresolved = outcome.still_unresolved.len(),
        skipped = outcome.skipped_without_bills,
        malformed = outcome.malformed,
        placement_failed = outcome.placement_failed,
        "event linking complete"
    );
    Ok(outcome)
}
