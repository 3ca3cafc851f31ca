use anyhow::Result;
use std::path::Path;

use crate::commands::CommandReport;
use crate::linker::event_archive::read_event;
use crate::linker::extract::extract_bill_ids;

pub fn run(file: &Path) -> Result<CommandReport> {
    let mut report = CommandReport::new("extract");
    report.detail(format!("file={}", file.display()));

    let event = read_event(file)?;
    match extract_bill_ids(&event) {
        Ok(ids) => {
            report.detail(format!("bill_count={}", ids.len()));
            for id in ids {
                report.detail(format!("bill={id}"));
            }
        }
        Err(err) => report.issue(format!("{}: {err}", err.code().as_str())),
    }
    Ok(report)
}
