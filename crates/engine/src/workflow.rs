//! Relocation request workflow
//!
//! A request moves through `absent -> pending -> {accepted, rejected}`. Both
//! terminal states delete the record, so a rejected pair can be proposed
//! again straight away. Proposals naming the root as parent skip the
//! pending state and relocate immediately.

use crate::engine::TreeEngine;
use crate::events::TreeEvent;
use crate::relocate::RelocationReport;
use canopy_core::{BranchId, Decision, RelocationRequest, Result, TreeError};
use tracing::info;

/// Result of [`TreeEngine::propose`]
#[derive(Debug, Clone)]
pub enum ProposalOutcome {
    /// Waiting for a moderator of the parent
    Pending(RelocationRequest),
    /// Moved to the root without approval
    Accepted(RelocationReport),
}

impl ProposalOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Result of [`TreeEngine::decide`]
#[derive(Debug, Clone)]
pub enum DecisionOutcome {
    Accepted(RelocationReport),
    Rejected(RelocationRequest),
}

impl TreeEngine {
    /// Ask to move `child` under `parent`
    ///
    /// Everything that would make the eventual accept fail is checked here,
    /// so moderators are never asked to approve an impossible move.
    pub fn propose(
        &self,
        parent: &BranchId,
        child: &BranchId,
        proposer: &str,
    ) -> Result<ProposalOutcome> {
        if parent == &self.root {
            let report = self.relocate(child, parent, true)?;
            info!("Auto-accepted move of '{}' to root by {}", child, proposer);
            self.outbox.publish(TreeEvent::RelocationAccepted {
                report: report.clone(),
                actor: proposer.to_string(),
                proposer: None,
            });
            return Ok(ProposalOutcome::Accepted(report));
        }

        self.validate_relocation(child, parent, true)?;

        let request = RelocationRequest::new(parent.clone(), child.clone(), proposer);
        self.stores.requests.create(&request)?;
        info!("{} proposed moving '{}' under '{}'", proposer, child, parent);

        self.outbox.publish(TreeEvent::RelocationProposed {
            request: request.clone(),
        });
        Ok(ProposalOutcome::Pending(request))
    }

    /// Accept or reject the pending request for `(parent, child)`
    ///
    /// If relocation fails the request stays pending so the same decision
    /// can be retried.
    pub fn decide(
        &self,
        parent: &BranchId,
        child: &BranchId,
        actor: &str,
        decision: Decision,
    ) -> Result<DecisionOutcome> {
        let request = self.stores.requests.find(parent, child)?.ok_or_else(|| {
            TreeError::not_found(format!("no pending request to move '{}' under '{}'", child, parent))
        })?;

        match decision {
            Decision::Accept => {
                // A previous accept wrote the parent pointer but not the delete
                if self.get_branch(child)?.parent.as_ref() == Some(parent) {
                    self.stores.requests.delete(parent, child)?;
                    return Err(TreeError::conflict(format!(
                        "'{}' is already a child of '{}'; stale request removed",
                        child, parent
                    )));
                }

                let report = self.relocate(child, parent, true)?;
                self.stores.requests.delete(parent, child)?;
                info!("{} accepted '{}' under '{}'", actor, child, parent);

                self.outbox.publish(TreeEvent::RelocationAccepted {
                    report: report.clone(),
                    actor: actor.to_string(),
                    proposer: Some(request.creator),
                });
                Ok(DecisionOutcome::Accepted(report))
            }
            Decision::Reject => {
                self.stores.requests.delete(parent, child)?;
                info!("{} rejected '{}' under '{}'", actor, child, parent);

                self.outbox.publish(TreeEvent::RelocationRejected {
                    request: request.clone(),
                    actor: actor.to_string(),
                });
                Ok(DecisionOutcome::Rejected(request))
            }
        }
    }

    /// Requests waiting on a moderator of `parent`
    pub fn pending_for_parent(&self, parent: &BranchId) -> Result<Vec<RelocationRequest>> {
        self.stores.requests.find_all_for_parent(parent)
    }

    /// Requests proposing to move `child`
    pub fn pending_for_child(&self, child: &BranchId) -> Result<Vec<RelocationRequest>> {
        self.stores.requests.find_all_for_child(child)
    }
}
