use anyhow::Result;

use crate::commands::CommandReport;
use crate::linker::audit;
use crate::linker::bill_sessions::FsBillDirLister;
use crate::linker::config::LinkerConfig;
use crate::linker::driver::{LinkContext, LinkOutcome, link_events};
use crate::linker::paths::resolve_paths;
use crate::linker::placement::FsEventPlacer;

#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    pub rebuild: bool,
}

fn summary(outcome: &LinkOutcome) -> String {
    format!(
        "scanned={} resolved={} deferred={} still_unresolved={} skipped={} malformed={} placement_failed={}",
        outcome.scanned,
        outcome.resolved_total(),
        outcome.deferred,
        outcome.still_unresolved.len(),
        outcome.skipped_without_bills,
        outcome.malformed,
        outcome.placement_failed,
    )
}

pub fn build_report(outcome: &LinkOutcome) -> CommandReport {
    let mut report = CommandReport::new("link");
    report.detail(format!("mapping_entries={}", outcome.mapping_entries));
    report.detail(format!("scanned={}", outcome.scanned));
    report.detail(format!("resolved_first_pass={}", outcome.resolved_first_pass));
    report.detail(format!("resolved_second_pass={}", outcome.resolved_second_pass));
    report.detail(format!("deferred={}", outcome.deferred));
    report.detail(format!(
        "rebuilt_for_second_pass={}",
        outcome.rebuilt_for_second_pass
    ));
    report.detail(format!("skipped_without_bills={}", outcome.skipped_without_bills));
    report.detail(format!("quarantine_removed={}", outcome.quarantine_removed));
    for resolved in &outcome.resolved {
        report.detail(format!(
            "linked={} bill={} path={} sha256={}",
            resolved.file, resolved.bill_id, resolved.placed_path, resolved.sha256
        ));
    }
    for file in &outcome.still_unresolved {
        report.detail(format!("unresolved={file}"));
    }

    if outcome.malformed > 0 {
        report.issue(format!(
            "{} archived event(s) could not be read or parsed",
            outcome.malformed
        ));
    }
    if outcome.placement_failed > 0 {
        report.issue(format!(
            "{} event(s) matched a bill but could not be placed",
            outcome.placement_failed
        ));
    }
    if outcome.cleanup_failed > 0 {
        report.issue(format!(
            "{} placed event(s) could not be removed from the archive",
            outcome.cleanup_failed
        ));
    }
    report
}

pub fn run(cfg: &LinkerConfig, opts: &LinkOptions) -> Result<CommandReport> {
    let paths = resolve_paths(&cfg.jurisdiction.state)?;
    let ctx = LinkContext {
        jurisdiction: &cfg.jurisdiction,
        paths: &paths,
        rebuild_on_start: opts.rebuild || cfg.linking.rebuild_on_start,
    };
    let lister = FsBillDirLister::new(&paths.processed_dir);

    let outcome = match link_events(&ctx, &lister, &FsEventPlacer) {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Err(audit_err) = audit::append_event(&paths, "link", "failed", &format!("{err:#}")) {
                tracing::warn!(error = %format!("{audit_err:#}"), "failed to append audit event");
            }
            return Err(err);
        }
    };

    let mut report = build_report(&outcome);
    let status = if !report.ok {
        "degraded"
    } else if outcome.still_unresolved.is_empty() {
        "ok"
    } else {
        "partial"
    };
    if let Err(err) = audit::append_event(&paths, "link", status, &summary(&outcome)) {
        report.issue(format!("audit log write failed: {err:#}"));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::driver::{Pass, ResolvedEvent};

    #[test]
    fn unresolved_events_are_details_not_issues() {
        let outcome = LinkOutcome {
            scanned: 2,
            resolved_first_pass: 1,
            deferred: 1,
            rebuilt_for_second_pass: true,
            resolved: vec![ResolvedEvent {
                file: "event_1.json".to_string(),
                bill_id: "HR1".to_string(),
                placed_path: "/x/HR1/logs/a.json".to_string(),
                sha256: "ab12".to_string(),
                pass: Pass::First,
            }],
            still_unresolved: vec!["event_2.json".to_string()],
            ..LinkOutcome::default()
        };

        let report = build_report(&outcome);
        assert!(report.ok);
        assert!(report.details.contains(&"unresolved=event_2.json".to_string()));
        assert!(
            report
                .details
                .iter()
                .any(|d| d.starts_with("linked=event_1.json bill=HR1"))
        );
    }

    #[test]
    fn placement_failures_make_the_report_fail() {
        let outcome = LinkOutcome {
            scanned: 1,
            placement_failed: 1,
            ..LinkOutcome::default()
        };
        let report = build_report(&outcome);
        assert!(!report.ok);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn summary_lists_headline_counts() {
        let outcome = LinkOutcome {
            scanned: 3,
            resolved_first_pass: 1,
            resolved_second_pass: 1,
            ..LinkOutcome::default()
        };
        let line = summary(&outcome);
        assert!(line.starts_with("scanned=3 resolved=2 "));
    }
}
