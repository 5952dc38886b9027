//! Ancestor index primitives
//!
//! The closure table holds one `(branch, ancestor)` row for every ancestor of
//! every branch, including the branch itself. Replacing a branch's ancestor
//! set touches only the symmetric difference of the old and new sets: rows in
//! the intersection stay put, and each removed row is paired with an added
//! row so the store sees one delete-then-insert per pair instead of a full
//! rewrite.

use canopy_core::{AncestorTag, BranchId, Result, TagStore};
use serde::Serialize;
use std::collections::BTreeSet;
use std::ops::AddAssign;
use std::sync::Arc;
use tracing::trace;

/// Row-level mutation plan for one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPlan {
    pub branch: BranchId,
    /// Ancestors present before and after; never written
    pub common: BTreeSet<BranchId>,
    /// `(removed, added)` pairs, applied as delete then insert
    pub swaps: Vec<(BranchId, BranchId)>,
    /// Surplus removals when the old set was larger
    pub deletes: Vec<BranchId>,
    /// Surplus additions when the new set was larger
    pub inserts: Vec<BranchId>,
}

impl TagPlan {
    /// Plan the change from `old` to `new`; the branch's own id is excluded
    /// from both sides since its self row never changes.
    pub fn compute(branch: &BranchId, old: &BTreeSet<BranchId>, new: &BTreeSet<BranchId>) -> Self {
        let common: BTreeSet<BranchId> = old
            .intersection(new)
            .filter(|id| *id != branch)
            .cloned()
            .collect();
        let removed: Vec<BranchId> = old
            .difference(new)
            .filter(|id| *id != branch)
            .cloned()
            .collect();
        let added: Vec<BranchId> = new
            .difference(old)
            .filter(|id| *id != branch)
            .cloned()
            .collect();

        let paired = removed.len().min(added.len());
        let swaps = removed
            .iter()
            .cloned()
            .zip(added.iter().cloned())
            .collect();

        Self {
            branch: branch.clone(),
            common,
            swaps,
            deletes: removed[paired..].to_vec(),
            inserts: added[paired..].to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty() && self.deletes.is_empty() && self.inserts.is_empty()
    }

    /// Store writes this plan issues
    pub fn write_count(&self) -> usize {
        self.swaps.len() * 2 + self.deletes.len() + self.inserts.len()
    }

    /// Apply the plan. Every step is idempotent, so re-applying a plan that
    /// was interrupted (or already completed) converges to the same rows.
    pub fn apply(&self, tags: &dyn TagStore) -> Result<TagPlanStats> {
        for (removed, added) in &self.swaps {
            tags.delete(&AncestorTag::new(self.branch.clone(), removed.clone()))?;
            tags.put(&AncestorTag::new(self.branch.clone(), added.clone()))?;
        }
        for removed in &self.deletes {
            tags.delete(&AncestorTag::new(self.branch.clone(), removed.clone()))?;
        }
        for added in &self.inserts {
            tags.put(&AncestorTag::new(self.branch.clone(), added.clone()))?;
        }

        trace!(
            "retagged {}: {} swaps, {} deletes, {} inserts, {} untouched",
            self.branch,
            self.swaps.len(),
            self.deletes.len(),
            self.inserts.len(),
            self.common.len()
        );

        Ok(TagPlanStats {
            swapped: self.swaps.len(),
            deleted: self.deletes.len(),
            inserted: self.inserts.len(),
            untouched: self.common.len(),
        })
    }
}

/// Counts of row mutations, summed over a relocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TagPlanStats {
    pub swapped: usize,
    pub deleted: usize,
    pub inserted: usize,
    pub untouched: usize,
}

impl TagPlanStats {
    pub fn writes(&self) -> usize {
        self.swapped * 2 + self.deleted + self.inserted
    }
}

impl AddAssign for TagPlanStats {
    fn add_assign(&mut self, other: Self) {
        self.swapped += other.swapped;
        self.deleted += other.deleted;
        self.inserted += other.inserted;
        self.untouched += other.untouched;
    }
}

/// Ancestor and descendant queries over the closure table
#[derive(Clone)]
pub struct AncestorIndex {
    tags: Arc<dyn TagStore>,
}

impl AncestorIndex {
    pub fn new(tags: Arc<dyn TagStore>) -> Self {
        Self { tags }
    }

    /// Every ancestor of `branch`, including `branch` itself and the root
    pub fn ancestors_of(&self, branch: &BranchId) -> Result<BTreeSet<BranchId>> {
        self.tags.query_by_branch(branch)
    }

    /// The subtree rooted at `branch`, including `branch` itself
    pub fn descendants_of(&self, branch: &BranchId) -> Result<BTreeSet<BranchId>> {
        self.tags.query_by_ancestor(branch)
    }

    /// Move `branch` from the `old` ancestor set to the `new` one
    pub fn replace_ancestor_set(
        &self,
        branch: &BranchId,
        old: &BTreeSet<BranchId>,
        new: &BTreeSet<BranchId>,
    ) -> Result<TagPlanStats> {
        TagPlan::compute(branch, old, new).apply(self.tags.as_ref())
    }

    /// Rows for a freshly created branch: itself plus its parent's ancestors
    pub fn tag_new_branch(
        &self,
        branch: &BranchId,
        parent_ancestors: &BTreeSet<BranchId>,
    ) -> Result<()> {
        self.tags
            .put(&AncestorTag::new(branch.clone(), branch.clone()))?;
        for ancestor in parent_ancestors {
            self.tags
                .put(&AncestorTag::new(branch.clone(), ancestor.clone()))?;
        }
        Ok(())
    }

    /// Drop the branch's own rows and every row naming it as an ancestor
    pub fn purge(&self, branch: &BranchId) -> Result<usize> {
        let mut removed = 0;
        for ancestor in self.tags.query_by_branch(branch)? {
            self.tags
                .delete(&AncestorTag::new(branch.clone(), ancestor))?;
            removed += 1;
        }
        for descendant in self.tags.query_by_ancestor(branch)? {
            self.tags
                .delete(&AncestorTag::new(descendant, branch.clone()))?;
            removed += 1;
        }
        Ok(removed)
    }
}
