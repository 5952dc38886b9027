//! Consistency audit and repair
//!
//! `verify` recomputes every branch's expected ancestor set from the parent
//! pointers and compares it with the closure table. `repair` rewrites the
//! closure rows of one subtree from the parent chain, which is how an
//! operation interrupted part way through is finished without re-running it.

use crate::engine::TreeEngine;
use crate::index::TagPlanStats;
use canopy_core::{AncestorTag, Branch, BranchId, BranchPatch, BranchState, Result, TreeError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use tracing::{info, warn};

/// A broken invariant found by [`TreeEngine::verify`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Parent pointer names a branch that does not exist
    MissingParent { branch: BranchId, parent: BranchId },
    /// Following parent pointers from `branch` loops
    Cycle { branch: BranchId },
    /// A branch other than the root has no parent
    StrayRoot { branch: BranchId },
    AncestorMismatch {
        branch: BranchId,
        expected: BTreeSet<BranchId>,
        actual: BTreeSet<BranchId>,
    },
    /// Closure row naming a branch that does not exist
    DanglingTag { tag: AncestorTag },
    /// Pending request naming a branch that does not exist
    DanglingRequest { parent: BranchId, child: BranchId },
    /// Parent index disagrees with the parent pointers
    ChildIndexMismatch {
        parent: BranchId,
        expected: BTreeSet<BranchId>,
        actual: BTreeSet<BranchId>,
    },
    /// A create or delete stopped part way through
    Unfinished { branch: BranchId, state: BranchState },
    CountMismatch { recorded: u64, actual: u64 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParent { branch, parent } => {
                write!(f, "{}: parent '{}' does not exist", branch, parent)
            }
            Self::Cycle { branch } => write!(f, "{}: parent chain loops", branch),
            Self::StrayRoot { branch } => write!(f, "{}: no parent", branch),
            Self::AncestorMismatch {
                branch,
                expected,
                actual,
            } => {
                let missing: Vec<_> = expected.difference(actual).map(|b| b.as_str()).collect();
                let extra: Vec<_> = actual.difference(expected).map(|b| b.as_str()).collect();
                write!(
                    f,
                    "{}: ancestors missing [{}], unexpected [{}]",
                    branch,
                    missing.join(", "),
                    extra.join(", ")
                )
            }
            Self::DanglingTag { tag } => write!(f, "dangling tag {}", tag),
            Self::DanglingRequest { parent, child } => {
                write!(f, "dangling request {} -> {}", child, parent)
            }
            Self::ChildIndexMismatch {
                parent,
                expected,
                actual,
            } => {
                let missing: Vec<_> = expected.difference(actual).map(|b| b.as_str()).collect();
                let extra: Vec<_> = actual.difference(expected).map(|b| b.as_str()).collect();
                write!(
                    f,
                    "{}: child index missing [{}], stale [{}]",
                    parent,
                    missing.join(", "),
                    extra.join(", ")
                )
            }
            Self::Unfinished { branch, state } => match state {
                BranchState::Deleting => write!(f, "{}: deletion was interrupted", branch),
                _ => write!(f, "{}: creation was interrupted", branch),
            },
            Self::CountMismatch { recorded, actual } => {
                write!(f, "branch count is {} but {} branches exist", recorded, actual)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub branches_checked: usize,
    pub violations: Vec<Violation>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// What [`TreeEngine::repair`] rewrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Branches whose rows were compared
    pub visited: usize,
    /// Branches whose rows had to change
    pub repaired: usize,
    pub stats: TagPlanStats,
    /// Rows removed because their branch no longer exists
    pub dangling_removed: usize,
    /// Requests removed because one side no longer exists
    pub requests_removed: usize,
    /// Parent index rows added or dropped
    pub index_rows_fixed: usize,
    /// Interrupted creates and deletes carried to the end
    pub finished: usize,
}

/// Expected ancestor set of `id` from parent pointers, or `None` on a loop.
/// A missing link ends the chain; it is reported on the branch that holds it.
fn chain_of(id: &BranchId, branches: &BTreeMap<BranchId, Branch>) -> Option<BTreeSet<BranchId>> {
    let mut chain = BTreeSet::new();
    let mut cursor = Some(id.clone());
    while let Some(current) = cursor {
        if !chain.insert(current.clone()) {
            return None;
        }
        cursor = branches.get(&current).and_then(|b| b.parent.clone());
    }
    Some(chain)
}

impl TreeEngine {
    /// Check the closure and no-cycle invariants over the whole tree
    pub fn verify(&self) -> Result<VerifyReport> {
        let branches: BTreeMap<BranchId, Branch> = self
            .stores
            .branches
            .list()?
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();
        let mut violations = Vec::new();

        for (id, branch) in &branches {
            match &branch.parent {
                None if id != &self.root => {
                    violations.push(Violation::StrayRoot { branch: id.clone() });
                    continue;
                }
                Some(parent) if !branches.contains_key(parent) => {
                    violations.push(Violation::MissingParent {
                        branch: id.clone(),
                        parent: parent.clone(),
                    });
                    continue;
                }
                _ => {}
            }

            let Some(expected) = chain_of(id, &branches) else {
                violations.push(Violation::Cycle { branch: id.clone() });
                continue;
            };
            let actual = self.index.ancestors_of(id)?;
            if actual != expected {
                violations.push(Violation::AncestorMismatch {
                    branch: id.clone(),
                    expected,
                    actual,
                });
            }
        }

        for tag in self.stores.tags.all_tags()? {
            if !branches.contains_key(&tag.branch) || !branches.contains_key(&tag.ancestor) {
                violations.push(Violation::DanglingTag { tag });
            }
        }

        for (parent, child) in self.dangling_requests(&branches)? {
            violations.push(Violation::DanglingRequest { parent, child });
        }

        let mut expected_children: BTreeMap<&BranchId, BTreeSet<BranchId>> = BTreeMap::new();
        for branch in branches.values() {
            if let Some(parent) = &branch.parent {
                expected_children
                    .entry(parent)
                    .or_default()
                    .insert(branch.id.clone());
            }
        }
        for id in branches.keys() {
            let expected = expected_children.remove(id).unwrap_or_default();
            let actual = self.stores.branches.children_of(id)?;
            if actual != expected {
                violations.push(Violation::ChildIndexMismatch {
                    parent: id.clone(),
                    expected,
                    actual,
                });
            }
        }

        for branch in branches.values() {
            if branch.state != BranchState::Active {
                violations.push(Violation::Unfinished {
                    branch: branch.id.clone(),
                    state: branch.state,
                });
            }
        }

        let recorded = self.stores.branches.count()?;
        let actual = branches.len() as u64;
        if recorded != actual {
            violations.push(Violation::CountMismatch { recorded, actual });
        }

        if !violations.is_empty() {
            warn!("Verification found {} violation(s)", violations.len());
        }
        Ok(VerifyReport {
            branches_checked: branches.len(),
            violations,
        })
    }

    /// Rewrite the closure rows of `branch` and everything below it so they
    /// match the parent pointers
    pub fn repair(&self, branch: &BranchId) -> Result<RepairReport> {
        let start = self.get_branch(branch)?;

        // Chain above the starting branch, read from parent pointers
        let mut above = BTreeSet::new();
        let mut cursor = start.parent.clone();
        while let Some(current) = cursor {
            if !above.insert(current.clone()) {
                return Err(TreeError::corrupt(format!(
                    "parent chain above '{}' loops at '{}'",
                    branch, current
                )));
            }
            cursor = self.get_branch(&current)?.parent;
        }

        let mut report = RepairReport::default();
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::from([(branch.clone(), above)]);

        while let Some((member, parent_chain)) = queue.pop_front() {
            if !visited.insert(member.clone()) {
                continue;
            }
            let mut expected = parent_chain;
            expected.insert(member.clone());

            let actual = self.index.ancestors_of(&member)?;
            report.visited += 1;
            if actual != expected {
                report.stats += self.index.replace_ancestor_set(&member, &actual, &expected)?;
                // The plan never touches the self row
                if !actual.contains(&member) {
                    self.stores
                        .tags
                        .put(&AncestorTag::new(member.clone(), member.clone()))?;
                    report.stats.inserted += 1;
                }
                report.repaired += 1;
            }

            for child in self.children_of(&member)? {
                queue.push_back((child, expected.clone()));
            }
        }

        info!(
            "Repaired subtree of '{}': {} of {} branches rewritten",
            branch, report.repaired, report.visited
        );
        Ok(report)
    }

    /// Bring the whole store back in line with the parent pointers
    ///
    /// Rebuilds the parent index, finishes interrupted deletes, repairs
    /// from the root, marks interrupted creates active, drops rows and
    /// requests naming missing branches, and fixes the counter.
    pub fn repair_all(&self) -> Result<RepairReport> {
        let index_rows_fixed = self.stores.branches.rebuild_child_index()?;

        let mut finished = 0;
        for branch in self.stores.branches.list()? {
            if branch.state == BranchState::Deleting {
                self.delete_branch(&branch.id, &self.config.system_actor)?;
                finished += 1;
            }
        }

        let mut report = self.repair(&self.root)?;
        report.index_rows_fixed = index_rows_fixed;

        let branches: BTreeMap<BranchId, Branch> = self
            .stores
            .branches
            .list()?
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();
        for branch in branches.values() {
            if branch.state == BranchState::Creating {
                self.stores
                    .branches
                    .update(&branch.id, &BranchPatch::state(BranchState::Active))?;
                finished += 1;
            }
        }
        report.finished = finished;

        for tag in self.stores.tags.all_tags()? {
            if !branches.contains_key(&tag.branch) || !branches.contains_key(&tag.ancestor) {
                self.stores.tags.delete(&tag)?;
                report.dangling_removed += 1;
            }
        }
        for (parent, child) in self.dangling_requests(&branches)? {
            self.stores.requests.delete(&parent, &child)?;
            report.requests_removed += 1;
        }

        let recorded = self.stores.branches.count()?;
        let actual = branches.len() as u64;
        if recorded != actual {
            self.stores
                .branches
                .adjust_count(actual as i64 - recorded as i64)?;
            info!("Branch count corrected from {} to {}", recorded, actual);
        }
        Ok(report)
    }

    /// Requests reachable from an existing branch whose other side is gone
    fn dangling_requests(
        &self,
        branches: &BTreeMap<BranchId, Branch>,
    ) -> Result<Vec<(BranchId, BranchId)>> {
        let mut dangling = BTreeSet::new();
        for id in branches.keys() {
            let mut requests = self.stores.requests.find_all_for_parent(id)?;
            requests.extend(self.stores.requests.find_all_for_child(id)?);
            for request in requests {
                if !branches.contains_key(&request.parent) || !branches.contains_key(&request.child)
                {
                    dangling.insert((request.parent, request.child));
                }
            }
        }
        Ok(dangling.into_iter().collect())
    }
}
