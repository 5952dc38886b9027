//! Read-only branch queries

use crate::session::Session;
use crate::util;
use anyhow::Result;
use canopy_core::BranchId;
use owo_colors::OwoColorize;
use std::collections::BTreeSet;

/// Show one branch record
pub fn run(session: &Session, id: &str) -> Result<()> {
    let id = BranchId::from(id);
    let branch = session.engine.get_branch(&id)?;

    if session.json {
        return util::print_json(&branch);
    }

    println!("{} {}", branch.id.as_str().yellow().bold(), branch.name.bold());
    println!("{}", "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━".dimmed());
    match &branch.parent {
        Some(parent) => println!("Parent:    {}", parent.as_str().cyan()),
        None => println!("Parent:    {}", "(root)".dimmed()),
    }
    println!("Creator:   {}", branch.creator);
    println!(
        "Created:   {}",
        util::format_relative_time(branch.created_at_ms).dimmed()
    );
    println!(
        "Children:  {}",
        session.engine.children_of(&id)?.len()
    );
    println!(
        "Subtree:   {} branches",
        session.engine.descendants_of(&id)?.len()
    );
    println!(
        "Activity:  {} posts, {} points, {} comments",
        branch.post_count, branch.post_points, branch.comment_count
    );
    if let Some(description) = &branch.description {
        println!("\n{}", description);
    }
    if let Some(rules) = &branch.rules {
        println!("\n{}\n{}", "Rules".bold(), rules);
    }
    Ok(())
}

pub fn run_ancestors(session: &Session, id: &str) -> Result<()> {
    let id = BranchId::from(id);
    // Missing branches have no rows; report them instead of an empty set
    session.engine.get_branch(&id)?;
    print_set(session, &format!("Ancestors of {}", id), session.engine.ancestors_of(&id)?)
}

pub fn run_descendants(session: &Session, id: &str) -> Result<()> {
    let id = BranchId::from(id);
    session.engine.get_branch(&id)?;
    print_set(session, &format!("Subtree of {}", id), session.engine.descendants_of(&id)?)
}

pub fn run_children(session: &Session, id: &str) -> Result<()> {
    let id = BranchId::from(id);
    session.engine.get_branch(&id)?;
    print_set(session, &format!("Children of {}", id), session.engine.children_of(&id)?)
}

fn print_set(session: &Session, heading: &str, ids: BTreeSet<BranchId>) -> Result<()> {
    if session.json {
        return util::print_json(&ids);
    }
    util::print_ids(heading, &ids);
    Ok(())
}
