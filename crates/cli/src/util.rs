//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use canopy_core::BranchId;
use canopy_engine::{ProposalOutcome, RelocationReport};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode JSON output")?;
    println!("{}", text);
    Ok(())
}

/// Print a set of branch ids, one per line, under a heading
pub fn print_ids(heading: &str, ids: &BTreeSet<BranchId>) {
    println!("{} {}", heading.bold(), format!("({})", ids.len()).dimmed());
    if ids.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for id in ids {
        println!("  {}", id.cyan());
    }
}

/// Summary lines for a completed relocation
pub fn print_relocation(report: &RelocationReport) {
    println!(
        "{} Moved '{}' from '{}' to '{}'",
        "✓".green(),
        report.moving.as_str().yellow(),
        report.old_parent,
        report.new_parent.as_str().cyan()
    );
    println!(
        "  {} {} branches retagged, {} row writes ({} untouched)",
        "→".dimmed(),
        report.subtree.len(),
        report.stats.writes(),
        report.stats.untouched
    );
}

/// JSON shape shared by `create` and `propose`
pub fn proposal_json(outcome: &ProposalOutcome) -> Value {
    match outcome {
        ProposalOutcome::Pending(request) => json!({ "status": "pending", "request": request }),
        ProposalOutcome::Accepted(report) => json!({ "status": "accepted", "relocation": report }),
    }
}

pub fn print_proposal(outcome: &ProposalOutcome) {
    match outcome {
        ProposalOutcome::Pending(request) => {
            println!(
                "{} Requested moving '{}' under '{}' (awaiting a moderator of '{}')",
                "✓".green(),
                request.child.as_str().yellow(),
                request.parent.as_str().cyan(),
                request.parent
            );
        }
        ProposalOutcome::Accepted(report) => print_relocation(report),
    }
}

/// Format timestamp as relative time ("2 hours ago")
pub fn format_relative_time(ts_ms: u64) -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    let datetime = UNIX_EPOCH + Duration::from_millis(ts_ms);

    match SystemTime::now().duration_since(datetime) {
        Ok(elapsed) => {
            let seconds = elapsed.as_secs();
            if seconds < 60 {
                format!("{} seconds ago", seconds)
            } else if seconds < 3600 {
                format!("{} minutes ago", seconds / 60)
            } else if seconds < 86400 {
                format!("{} hours ago", seconds / 3600)
            } else if seconds < 604800 {
                format!("{} days ago", seconds / 86400)
            } else {
                format!("{} weeks ago", seconds / 604800)
            }
        }
        Err(_) => "in the future".to_string(),
    }
}
