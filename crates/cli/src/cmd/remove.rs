//! Detach and delete

use crate::session::Session;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run_detach(session: &Session, id: &str) -> Result<()> {
    let report = session.engine.detach(&id.into(), &session.actor)?;
    if session.json {
        return util::print_json(&report);
    }
    util::print_relocation(&report);
    Ok(())
}

pub fn run_delete(session: &Session, id: &str) -> Result<()> {
    let report = session.engine.delete_branch(&id.into(), &session.actor)?;
    if session.json {
        return util::print_json(&report);
    }

    println!("{} Deleted branch '{}'", "✓".green(), report.branch.as_str().yellow());
    if !report.reassigned.is_empty() {
        let names: Vec<&str> = report.reassigned.iter().map(|id| id.as_str()).collect();
        println!(
            "  {} moved to {}: {}",
            "→".dimmed(),
            session.engine.root_id().as_str().cyan(),
            names.join(", ")
        );
    }
    println!(
        "  {} {} ancestor rows and {} pending requests removed",
        "→".dimmed(),
        report.tags_removed,
        report.requests_removed
    );
    Ok(())
}
