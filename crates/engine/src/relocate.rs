//! Relocation: re-parent a branch and retag its whole subtree
//!
//! Every member of the moving subtree relates to the stale and the newly
//! gained ancestors exactly as the moving branch does, so one pair of
//! changed-ancestor sets is computed and applied to each member in turn.
//! The parent pointer is written last; until then the same computation can
//! be repeated from current state and converges to the same rows.

use crate::engine::TreeEngine;
use crate::index::TagPlanStats;
use canopy_core::{Branch, BranchId, BranchPatch, BranchState, Result, TreeError};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// What a relocation changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationReport {
    pub moving: BranchId,
    pub old_parent: BranchId,
    pub new_parent: BranchId,
    /// Every retagged branch, the moving branch included
    pub subtree: BTreeSet<BranchId>,
    /// Ancestors the subtree lost
    pub removed_ancestors: BTreeSet<BranchId>,
    /// Ancestors the subtree gained
    pub added_ancestors: BTreeSet<BranchId>,
    pub stats: TagPlanStats,
}

/// Checks that pass before any write
pub(crate) struct Validated {
    pub(crate) moving: Branch,
    pub(crate) old_parent: BranchId,
    pub(crate) target_ancestors: BTreeSet<BranchId>,
}

impl TreeEngine {
    /// Validate moving `moving` under `target` without writing anything
    ///
    /// Fails with `NotFound` for a missing branch, `Forbidden` for the root,
    /// `Conflict` if `moving` already sits under `target` or (when
    /// `check_cycle`) if `target` descends from `moving`.
    pub(crate) fn validate_relocation(
        &self,
        moving: &BranchId,
        target: &BranchId,
        check_cycle: bool,
    ) -> Result<Validated> {
        let moving_branch = self.get_branch(moving)?;
        let target_branch = self.get_branch(target)?;
        for branch in [&moving_branch, &target_branch] {
            if branch.state == BranchState::Deleting {
                return Err(TreeError::conflict(format!("'{}' is being deleted", branch.id)));
            }
        }

        let old_parent = moving_branch
            .parent
            .clone()
            .ok_or_else(|| TreeError::forbidden("the root branch cannot be relocated"))?;

        let target_ancestors = self.index.ancestors_of(target)?;
        if check_cycle && target_ancestors.contains(moving) {
            return Err(TreeError::conflict(format!(
                "moving '{}' under '{}' would create a cycle",
                moving, target
            )));
        }
        if &old_parent == target {
            return Err(TreeError::conflict(format!(
                "'{}' is already a child of '{}'",
                moving, target
            )));
        }

        Ok(Validated {
            moving: moving_branch,
            old_parent,
            target_ancestors,
        })
    }

    /// Validate, retag the subtree, then write the new parent pointer
    pub(crate) fn relocate(
        &self,
        moving: &BranchId,
        target: &BranchId,
        check_cycle: bool,
    ) -> Result<RelocationReport> {
        let Validated {
            moving: moving_branch,
            old_parent,
            target_ancestors,
        } = self.validate_relocation(moving, target, check_cycle)?;

        // Full chains above the old and new parent
        let mut old_ancestors = self.index.ancestors_of(&old_parent)?;
        let mut new_ancestors = target_ancestors;
        old_ancestors.remove(moving);
        new_ancestors.remove(moving);

        // Common prefix stays; only the differences move
        let removed: BTreeSet<BranchId> = old_ancestors.difference(&new_ancestors).cloned().collect();
        let added: BTreeSet<BranchId> = new_ancestors.difference(&old_ancestors).cloned().collect();

        let mut subtree = self.index.descendants_of(moving)?;
        subtree.insert(moving.clone());

        debug!(
            "relocating {} ({} members): -{:?} +{:?}",
            moving,
            subtree.len(),
            removed,
            added
        );

        let mut stats = TagPlanStats::default();
        for member in &subtree {
            stats += self.index.replace_ancestor_set(member, &removed, &added)?;
        }
        stats.untouched = old_ancestors.intersection(&new_ancestors).count() * subtree.len();

        self.stores
            .branches
            .update(&moving_branch.id, &BranchPatch::parent(target.clone()))?;

        info!(
            "Relocated '{}' from '{}' to '{}' ({} branches, {} row writes)",
            moving,
            old_parent,
            target,
            subtree.len(),
            stats.writes()
        );

        Ok(RelocationReport {
            moving: moving.clone(),
            old_parent,
            new_parent: target.clone(),
            subtree,
            removed_ancestors: removed,
            added_ancestors: added,
            stats,
        })
    }
}
