//! Relocation requests: propose, decide, list

use crate::session::Session;
use crate::util;
use anyhow::Result;
use canopy_core::{BranchId, Decision};
use canopy_engine::DecisionOutcome;
use owo_colors::OwoColorize;
use serde_json::json;

pub fn run_propose(session: &Session, parent: &str, child: &str) -> Result<()> {
    let outcome = session
        .engine
        .propose(&parent.into(), &child.into(), &session.actor)?;

    if session.json {
        return util::print_json(&util::proposal_json(&outcome));
    }
    util::print_proposal(&outcome);
    Ok(())
}

pub fn run_decide(session: &Session, parent: &str, child: &str, decision: Decision) -> Result<()> {
    let outcome = session
        .engine
        .decide(&parent.into(), &child.into(), &session.actor, decision)?;

    match outcome {
        DecisionOutcome::Accepted(report) => {
            if session.json {
                return util::print_json(&json!({ "status": "accepted", "relocation": report }));
            }
            util::print_relocation(&report);
        }
        DecisionOutcome::Rejected(request) => {
            if session.json {
                return util::print_json(&json!({ "status": "rejected", "request": request }));
            }
            println!(
                "{} Rejected moving '{}' under '{}' (proposed by {})",
                "✗".red(),
                request.child.as_str().yellow(),
                request.parent.as_str().cyan(),
                request.creator
            );
        }
    }
    Ok(())
}

/// Pending requests by parent, or by child with `as_child`
pub fn run_list(session: &Session, id: &str, as_child: bool) -> Result<()> {
    let id = BranchId::from(id);
    session.engine.get_branch(&id)?;
    let requests = if as_child {
        session.engine.pending_for_child(&id)?
    } else {
        session.engine.pending_for_parent(&id)?
    };

    if session.json {
        return util::print_json(&requests);
    }

    let heading = if as_child {
        format!("Requests to move {}", id)
    } else {
        format!("Requests to join {}", id)
    };
    println!("{} {}", heading.bold(), format!("({})", requests.len()).dimmed());
    if requests.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for request in &requests {
        println!(
            "  {} → {}  {} {}",
            request.child.as_str().yellow(),
            request.parent.as_str().cyan(),
            format!("by {}", request.creator).dimmed(),
            util::format_relative_time(request.created_at_ms).dimmed()
        );
    }
    Ok(())
}
