//! Create a branch

use crate::session::Session;
use crate::util;
use anyhow::Result;
use canopy_core::{BranchId, NewBranch};
use owo_colors::OwoColorize;
use serde_json::json;

pub fn run(
    session: &Session,
    id: String,
    name: String,
    parent: Option<String>,
    description: Option<String>,
    rules: Option<String>,
) -> Result<()> {
    let target = parent.map(BranchId::from);
    let outcome = session.engine.create_branch(
        NewBranch {
            id,
            name,
            description,
            rules,
        },
        &session.actor,
        target.as_ref(),
    )?;

    if session.json {
        return util::print_json(&json!({
            "branch": outcome.branch,
            "proposal": outcome.proposal.as_ref().map(util::proposal_json),
        }));
    }

    println!(
        "{} Created branch '{}' ({})",
        "✓".green(),
        outcome.branch.id.as_str().yellow(),
        outcome.branch.name
    );
    if let Some(proposal) = &outcome.proposal {
        util::print_proposal(proposal);
    }
    Ok(())
}
