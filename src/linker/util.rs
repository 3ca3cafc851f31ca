use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

const SLUG_MAX_CHARS: usize = 40;

/// Return the current Unix epoch in seconds.
pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Render a scraped date or datetime as the archive's compact UTC stamp,
/// `YYYYMMDDTHHMMSSZ`. Date-only values get a midnight time.
pub fn format_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(render(dt.with_timezone(&Utc).naive_utc()));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(render(naive));
        }
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%z") {
        return Some(render(dt.with_timezone(&Utc).naive_utc()));
    }
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(render)
}

fn render(naive: NaiveDateTime) -> String {
    naive.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Lower-cased file-name slug: runs of non-word characters collapse to `_`,
/// edges are trimmed and the result is capped at 40 characters.
pub fn slugify_event_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_sep = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() || ch == '_' {
            out.push(ch);
            prev_sep = false;
        } else if !prev_sep {
            out.push('_');
            prev_sep = true;
        }
    }
    let trimmed: String = out.trim_matches('_').chars().take(SLUG_MAX_CHARS).collect();
    if trimmed.is_empty() {
        "event".to_string()
    } else {
        trimmed
    }
}
