//! Manage the moderator roster

use crate::session::Session;
use crate::util;
use anyhow::Result;
use canopy_core::{BranchId, ModeratorRoster};
use owo_colors::OwoColorize;
use serde_json::json;

pub fn run_add(session: &Session, branch: &str, user: &str) -> Result<()> {
    let branch = BranchId::from(branch);
    session.engine.get_branch(&branch)?;
    session.db.roster().add_moderator(&branch, user)?;

    if session.json {
        return util::print_json(&json!({ "branch": branch, "user": user, "added": true }));
    }
    println!(
        "{} {} now moderates '{}'",
        "✓".green(),
        user.yellow(),
        branch.as_str().cyan()
    );
    Ok(())
}

pub fn run_remove(session: &Session, branch: &str, user: &str) -> Result<()> {
    let branch = BranchId::from(branch);
    let removed = session.db.roster().remove_moderator(&branch, user)?;

    if session.json {
        return util::print_json(&json!({ "branch": branch, "user": user, "removed": removed }));
    }
    if removed {
        println!(
            "{} {} no longer moderates '{}'",
            "✓".green(),
            user.yellow(),
            branch.as_str().cyan()
        );
    } else {
        println!("{} is not a moderator of '{}'", user, branch);
    }
    Ok(())
}

pub fn run_list(session: &Session, branch: &str) -> Result<()> {
    let branch = BranchId::from(branch);
    let moderators = session.db.roster().moderators_of(&branch)?;

    if session.json {
        return util::print_json(&moderators);
    }
    println!(
        "{} {}",
        format!("Moderators of {}", branch).bold(),
        format!("({})", moderators.len()).dimmed()
    );
    if moderators.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for user in &moderators {
        println!("  {}", user.yellow());
    }
    Ok(())
}
