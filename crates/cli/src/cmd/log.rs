//! Show the moderation log

use crate::session::Session;
use crate::util;
use anyhow::Result;
use canopy_core::BranchId;
use owo_colors::OwoColorize;

pub fn run(session: &Session, branch: Option<&str>, limit: usize) -> Result<()> {
    let modlog = session.db.modlog();
    let entries = match branch {
        Some(id) => modlog.for_branch(&BranchId::from(id), limit)?,
        None => modlog.recent(limit)?,
    };

    if session.json {
        return util::print_json(&entries);
    }

    if entries.is_empty() {
        println!("{}", "No moderation log entries".dimmed());
        return Ok(());
    }

    println!(
        "{} {}",
        "Moderation Log".bold(),
        format!("(showing {} of {})", entries.len(), modlog.count()).dimmed()
    );
    for entry in &entries {
        let details: Vec<String> = entry
            .payload
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        println!(
            "{:<16} {:<20} {:<12} {} {}",
            util::format_relative_time(entry.timestamp_ms).dimmed(),
            entry.action.as_str().cyan(),
            entry.branch.as_str().yellow(),
            format!("by {}", entry.actor),
            details.join(" ").dimmed()
        );
    }
    Ok(())
}
