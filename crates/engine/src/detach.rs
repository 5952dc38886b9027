//! Detach and delete

use crate::engine::TreeEngine;
use crate::events::TreeEvent;
use crate::relocate::RelocationReport;
use canopy_core::{BranchId, BranchPatch, BranchState, Result, TreeError};
use serde::Serialize;
use tracing::{debug, info};

/// What [`TreeEngine::delete_branch`] removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub branch: BranchId,
    /// Former children, now directly under the root
    pub reassigned: Vec<BranchId>,
    pub tags_removed: usize,
    pub requests_removed: usize,
}

impl TreeEngine {
    /// Move `branch` straight to the root without a request
    pub fn detach(&self, branch: &BranchId, actor: &str) -> Result<RelocationReport> {
        if branch == &self.root {
            return Err(TreeError::forbidden("the root branch cannot be detached"));
        }
        // Moving towards the root cannot close a cycle
        let report = self.relocate(branch, &self.root, false)?;
        self.outbox.publish(TreeEvent::BranchDetached {
            report: report.clone(),
            actor: actor.to_string(),
        });
        Ok(report)
    }

    /// Permanently remove a root-level branch
    ///
    /// The record is first marked `Deleting` and is removed last, after the
    /// counter. Children are detached to the root, so their subtrees keep a
    /// live ancestor chain. Re-running after a backend failure finds the
    /// marked record and resumes where the previous attempt stopped.
    pub fn delete_branch(&self, branch: &BranchId, actor: &str) -> Result<DeleteReport> {
        if branch == &self.root {
            return Err(TreeError::forbidden("the root branch cannot be deleted"));
        }
        let record = self.get_branch(branch)?;
        if record.parent.as_ref() != Some(&self.root) {
            return Err(TreeError::forbidden(format!(
                "'{}' is not a root-level branch; detach it first",
                branch
            )));
        }
        if record.state == BranchState::Deleting {
            debug!("Resuming deletion of '{}'", branch);
        } else {
            self.stores
                .branches
                .update(branch, &BranchPatch::state(BranchState::Deleting))?;
        }

        // 1. Reassign direct children
        let children = self.children_of(branch)?;
        let mut reassigned = Vec::with_capacity(children.len());
        for child in children {
            self.detach(&child, &self.config.system_actor)?;
            reassigned.push(child);
        }

        // 2. Own rows and every row naming this branch as an ancestor
        let tags_removed = self.index.purge(branch)?;

        // 3. Requests on either side
        let mut requests_removed = 0;
        let mut pending = self.stores.requests.find_all_for_parent(branch)?;
        pending.extend(self.stores.requests.find_all_for_child(branch)?);
        for request in pending {
            self.stores.requests.delete(&request.parent, &request.child)?;
            requests_removed += 1;
        }
        debug!(
            "deleting {}: {} tags, {} requests removed",
            branch, tags_removed, requests_removed
        );

        // 4. The counter, then the record itself
        self.stores.branches.adjust_count(-1)?;
        self.stores.branches.delete(branch)?;
        info!(
            "Deleted branch '{}' ({} children reassigned to '{}')",
            branch,
            reassigned.len(),
            self.root
        );

        let report = DeleteReport {
            branch: branch.clone(),
            reassigned,
            tags_removed,
            requests_removed,
        };
        self.outbox.publish(TreeEvent::BranchDeleted {
            report: report.clone(),
            actor: actor.to_string(),
        });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use crate::events::{Outbox, TreeEvent};
    use crate::TreeEngine;
    use canopy_core::{BranchId, NewBranch, Stores, TreeConfig, TreeError};
    use std::collections::BTreeSet;

    fn ids(list: &[&str]) -> BTreeSet<BranchId> {
        list.iter().map(|s| BranchId::from(*s)).collect()
    }

    fn add(engine: &TreeEngine, id: &str, parent: &str) {
        engine
            .create_branch(
                NewBranch {
                    id: id.to_string(),
                    name: id.to_string(),
                    ..NewBranch::default()
                },
                "alice",
                None,
            )
            .unwrap();
        if parent != "root" {
            engine.relocate(&id.into(), &parent.into(), true).unwrap();
        }
    }

    #[test]
    fn test_detach_moves_subtree_to_root() {
        let engine =
            TreeEngine::new(Stores::in_memory(), TreeConfig::default(), Outbox::discard()).unwrap();
        engine.ensure_root().unwrap();
        add(&engine, "a", "root");
        add(&engine, "b", "a");
        add(&engine, "c", "b");

        let report = engine.detach(&"b".into(), "mod").unwrap();
        assert_eq!(report.new_parent, BranchId::from("root"));
        assert_eq!(engine.ancestors_of(&"c".into()).unwrap(), ids(&["b", "c", "root"]));
        assert_eq!(engine.descendants_of(&"a".into()).unwrap(), ids(&["a"]));

        assert!(matches!(
            engine.detach(&"b".into(), "mod"),
            Err(TreeError::Conflict(_))
        ));
        assert!(matches!(
            engine.detach(&"root".into(), "mod"),
            Err(TreeError::Forbidden(_))
        ));
    }

    #[test]
    fn test_delete_reassigns_children_and_cleans_up() {
        let (outbox, rx) = Outbox::channel();
        let engine = TreeEngine::new(Stores::in_memory(), TreeConfig::default(), outbox).unwrap();
        engine.ensure_root().unwrap();
        add(&engine, "p", "root");
        add(&engine, "x", "p");
        add(&engine, "y", "p");
        add(&engine, "z", "x");
        add(&engine, "q", "root");
        engine.propose(&"p".into(), &"q".into(), "carol").unwrap();
        rx.try_iter().for_each(drop);

        let report = engine.delete_branch(&"p".into(), "admin").unwrap();
        assert_eq!(report.reassigned, vec![BranchId::from("x"), BranchId::from("y")]);
        assert_eq!(report.requests_removed, 1);

        assert_eq!(engine.ancestors_of(&"x".into()).unwrap(), ids(&["root", "x"]));
        assert_eq!(engine.ancestors_of(&"z".into()).unwrap(), ids(&["root", "x", "z"]));
        assert!(engine.descendants_of(&"p".into()).unwrap().is_empty());
        assert!(engine.pending_for_child(&"q".into()).unwrap().is_empty());
        assert!(matches!(engine.get_branch(&"p".into()), Err(TreeError::NotFound(_))));
        // root, x, y, z, q
        assert_eq!(engine.branch_count().unwrap(), 5);

        let events: Vec<_> = rx.try_iter().collect();
        let detached = events
            .iter()
            .filter(|e| matches!(e, TreeEvent::BranchDetached { actor, .. } if actor == "system"))
            .count();
        assert_eq!(detached, 2);
        assert!(matches!(events.last(), Some(TreeEvent::BranchDeleted { .. })));
    }

    #[test]
    fn test_delete_requires_root_level() {
        let engine =
            TreeEngine::new(Stores::in_memory(), TreeConfig::default(), Outbox::discard()).unwrap();
        engine.ensure_root().unwrap();
        add(&engine, "a", "root");
        add(&engine, "b", "a");

        assert!(matches!(
            engine.delete_branch(&"b".into(), "admin"),
            Err(TreeError::Forbidden(_))
        ));
        assert!(matches!(
            engine.delete_branch(&"root".into(), "admin"),
            Err(TreeError::Forbidden(_))
        ));
        assert!(matches!(
            engine.delete_branch(&"ghost".into(), "admin"),
            Err(TreeError::NotFound(_))
        ));
        assert_eq!(engine.ancestors_of(&"b".into()).unwrap(), ids(&["a", "b", "root"]));
    }
}
