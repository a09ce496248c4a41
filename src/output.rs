//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Sync progress
//!
//! ```text
//! Deleting (1)
//!     - docs/old.md (source removed)
//! Converting (2)
//!     docs/new.md → docs/new.md
//!     docs/note__de.md → i18n/de/docusaurus-plugin-content-docs/current/note.md
//! Generating assets (1)
//!     + photo_w300.webp
//!
//! 2 converted, 0 copied, 1 deleted, 14 unchanged, assets 1 generated / 0 removed
//! ```
//!
//! ## Check
//!
//! ```text
//! Vault
//! docs (docs, 12 files)
//! news__blog (blogMulti, 3 files)
//! assets (assets, 40 files)
//!
//! Plan
//!     convert docs/new.md → docs/new.md
//!     delete  docs/old.md (source removed)
//! 1 to delete, 1 to convert, 14 unchanged
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::scan::ScanResult;
use crate::sync::{SyncEvent, SyncPlan, SyncReport};
use crate::types::FileRole;

// ============================================================================
// Sync progress
// ============================================================================

/// Format one progress event as display lines.
pub fn format_sync_event(event: &SyncEvent) -> Vec<String> {
    match event {
        SyncEvent::PhaseStarted { count: 0, .. } => Vec::new(),
        SyncEvent::PhaseStarted { phase, count } => vec![format!("{phase} ({count})")],
        SyncEvent::Issue { message } => vec![format!("warning: {message}")],
        SyncEvent::Pruned { source } => vec![format!("    ~ {source} (target missing)")],
        SyncEvent::Deleted { target, reason } => vec![format!("    - {target} ({reason})")],
        SyncEvent::Converted {
            source,
            target,
            role,
        } => {
            let marker = match role {
                FileRole::Document => "",
                FileRole::Companion | FileRole::Binary | FileRole::Skipped => " (copied)",
            };
            vec![format!("    {source} → {target}{marker}")]
        }
        SyncEvent::Failed { path, message } => vec![format!("    ! {path}: {message}")],
        SyncEvent::Swept { target } => vec![format!("    - {target} (orphan)")],
        SyncEvent::AssetGenerated { name } => vec![format!("    + {name}")],
        SyncEvent::AssetRemoved { name } => vec![format!("    - {name} (unreferenced)")],
    }
}

pub fn format_report(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![String::new(), report.to_string()];
    if report.protected > 0 {
        lines.push(format!(
            "{} entries kept: their vault folder could not be read",
            report.protected
        ));
    }
    if report.issues > 0 {
        lines.push(format!("{} scan issues", report.issues));
    }
    lines
}

pub fn print_report(report: &SyncReport) {
    for line in format_report(report) {
        println!("{line}");
    }
}

// ============================================================================
// Check
// ============================================================================

/// Vault inventory: mirrored folders with their kind and file count.
pub fn format_scan(scan: &ScanResult) -> Vec<String> {
    let mut lines = vec!["Vault".to_string()];
    if scan.folders.is_empty() {
        lines.push("    (no docs, blog or asset folders)".to_string());
    }
    for folder in &scan.folders {
        lines.push(format!(
            "{} ({}, {} files)",
            folder.name,
            folder.kind.label(),
            folder.files.len()
        ));
    }
    for dir in &scan.unreadable {
        lines.push(format!("    unreadable: {dir}/"));
    }
    for issue in &scan.issues {
        lines.push(format!("    warning: {issue}"));
    }
    lines
}

pub fn format_plan(plan: &SyncPlan) -> Vec<String> {
    let mut lines = vec!["Plan".to_string()];
    for source in &plan.unseen {
        lines.push(format!("    rebuild {source} (target missing)"));
    }
    for source in &plan.released {
        lines.push(format!("    release {source} (target shared)"));
    }
    for deletion in &plan.deletions {
        lines.push(format!(
            "    delete  {} ({})",
            deletion.target, deletion.reason
        ));
    }
    for conversion in &plan.conversions {
        lines.push(format!(
            "    convert {} → {}",
            conversion.source, conversion.target
        ));
    }
    for source in &plan.protected {
        lines.push(format!("    keep    {source} (folder unreadable)"));
    }
    for collision in &plan.collisions {
        lines.push(format!(
            "    skip    {} (same target as {})",
            collision.source, collision.kept
        ));
    }
    if plan.is_empty() {
        lines.push("    nothing to do".to_string());
    }
    lines.push(format!(
        "{} to delete, {} to convert, {} unchanged",
        plan.deletions.len(),
        plan.conversions.len(),
        plan.unchanged
    ));
    lines
}

pub fn print_check(scan: &ScanResult, plan: &SyncPlan) {
    for line in format_scan(scan) {
        println!("{line}");
    }
    println!();
    for line in format_plan(plan) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{DeleteReason, Phase, PlannedConversion, PlannedDeletion, TargetCollision};
    use crate::types::{ContentKind, MainFolder};
    use std::path::PathBuf;

    // =========================================================================
    // Events
    // =========================================================================

    #[test]
    fn phase_header_shows_count() {
        let lines = format_sync_event(&SyncEvent::PhaseStarted {
            phase: Phase::Convert,
            count: 3,
        });
        assert_eq!(lines, vec!["Converting (3)"]);
    }

    #[test]
    fn empty_phase_is_silent() {
        let lines = format_sync_event(&SyncEvent::PhaseStarted {
            phase: Phase::Delete,
            count: 0,
        });
        assert!(lines.is_empty());
    }

    #[test]
    fn converted_document_and_copy() {
        let doc = format_sync_event(&SyncEvent::Converted {
            source: "docs/a.md".into(),
            target: "docs/a.md".into(),
            role: FileRole::Document,
        });
        assert_eq!(doc, vec!["    docs/a.md → docs/a.md"]);

        let copy = format_sync_event(&SyncEvent::Converted {
            source: "docs/meta.yml.md".into(),
            target: "docs/meta.yml".into(),
            role: FileRole::Companion,
        });
        assert_eq!(copy, vec!["    docs/meta.yml.md → docs/meta.yml (copied)"]);
    }

    #[test]
    fn deletion_shows_reason() {
        let lines = format_sync_event(&SyncEvent::Deleted {
            target: "docs/old.md".into(),
            reason: DeleteReason::SourceMissing,
        });
        assert_eq!(lines, vec!["    - docs/old.md (source removed)"]);
    }

    #[test]
    fn failure_line() {
        let lines = format_sync_event(&SyncEvent::Failed {
            path: "docs/a.md".into(),
            message: "permission denied".into(),
        });
        assert_eq!(lines, vec!["    ! docs/a.md: permission denied"]);
    }

    // =========================================================================
    // Report
    // =========================================================================

    #[test]
    fn report_mentions_protected_entries() {
        let report = SyncReport {
            protected: 2,
            ..SyncReport::default()
        };
        let lines = format_report(&report);
        assert_eq!(lines[0], "");
        assert!(lines[2].starts_with("2 entries kept"));
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn scan_lists_folders() {
        let scan = ScanResult {
            folders: vec![MainFolder {
                name: "news__blog".into(),
                kind: ContentKind::BlogMulti,
                path: PathBuf::from("/vault/news__blog"),
                files: Vec::new(),
            }],
            unreadable: vec!["docs/private".into()],
            ..ScanResult::default()
        };
        assert_eq!(
            format_scan(&scan),
            vec![
                "Vault",
                "news__blog (blogMulti, 0 files)",
                "    unreadable: docs/private/"
            ]
        );
    }

    #[test]
    fn empty_plan() {
        let lines = format_plan(&SyncPlan::default());
        assert_eq!(
            lines,
            vec!["Plan", "    nothing to do", "0 to delete, 0 to convert, 0 unchanged"]
        );
    }

    #[test]
    fn plan_lists_actions() {
        let plan = SyncPlan {
            deletions: vec![PlannedDeletion {
                source: "docs/old.md".into(),
                target: "docs/old.md".into(),
                reason: DeleteReason::SourceModified,
            }],
            conversions: vec![PlannedConversion {
                source: "docs/old.md".into(),
                target: "docs/old.md".into(),
                role: FileRole::Document,
            }],
            unchanged: 4,
            ..SyncPlan::default()
        };
        assert_eq!(
            format_plan(&plan),
            vec![
                "Plan",
                "    delete  docs/old.md (source modified)",
                "    convert docs/old.md → docs/old.md",
                "1 to delete, 1 to convert, 4 unchanged"
            ]
        );
    }

    #[test]
    fn plan_lists_collisions() {
        let plan = SyncPlan {
            collisions: vec![TargetCollision {
                source: "docs/guide+/more.md".into(),
                target: "docs/guide.md".into(),
                kept: "docs/guide+/intro.md".into(),
            }],
            unchanged: 1,
            ..SyncPlan::default()
        };
        assert_eq!(
            format_plan(&plan),
            vec![
                "Plan",
                "    skip    docs/guide+/more.md (same target as docs/guide+/intro.md)",
                "    nothing to do",
                "0 to delete, 0 to convert, 1 unchanged"
            ]
        );
    }
}
