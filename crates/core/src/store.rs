//! Store and collaborator interfaces
//!
//! The backing store offers single-key reads, index queries, conditional puts
//! and deletes. Nothing here is transactional across records: a multi-row
//! change is a sequence of independent calls.

use crate::branch::{Branch, BranchId, BranchPatch, Username};
use crate::error::Result;
use crate::records::{AncestorTag, ModLogEntry, Notification, RelocationRequest};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One record per branch, plus a secondary index keyed by parent
pub trait BranchStore: Send + Sync {
    fn get(&self, id: &BranchId) -> Result<Option<Branch>>;

    /// Conditional insert; `Conflict` if the id is already taken
    fn create(&self, branch: &Branch) -> Result<()>;

    /// Apply `patch` to an existing record; `NotFound` if missing
    fn update(&self, id: &BranchId, patch: &BranchPatch) -> Result<Branch>;

    /// Remove a record; removing a missing record is not an error
    fn delete(&self, id: &BranchId) -> Result<()>;

    /// Direct children, read from the parent index
    fn children_of(&self, id: &BranchId) -> Result<BTreeSet<BranchId>>;

    /// Recompute the parent index from the records; returns rows changed
    fn rebuild_child_index(&self) -> Result<usize>;

    fn list(&self) -> Result<Vec<Branch>>;

    /// Global branch counter
    fn count(&self) -> Result<u64>;

    /// Add `delta` to the global counter (saturating at zero)
    fn adjust_count(&self, delta: i64) -> Result<u64>;
}

/// Closure-table rows, indexed both by branch and by ancestor
///
/// `put` and `delete` are idempotent: re-putting a present row or deleting an
/// absent one succeeds without change.
pub trait TagStore: Send + Sync {
    /// Every ancestor tagged to `branch` (including itself)
    fn query_by_branch(&self, branch: &BranchId) -> Result<BTreeSet<BranchId>>;

    /// Every branch that carries `ancestor` as a tag (including itself)
    fn query_by_ancestor(&self, ancestor: &BranchId) -> Result<BTreeSet<BranchId>>;

    fn put(&self, tag: &AncestorTag) -> Result<()>;

    fn delete(&self, tag: &AncestorTag) -> Result<()>;

    /// Full scan, used only by verification
    fn all_tags(&self) -> Result<Vec<AncestorTag>>;
}

/// Pending relocation proposals keyed by `(parent, child)`
pub trait RequestStore: Send + Sync {
    fn find(&self, parent: &BranchId, child: &BranchId) -> Result<Option<RelocationRequest>>;

    fn find_all_for_parent(&self, parent: &BranchId) -> Result<Vec<RelocationRequest>>;

    fn find_all_for_child(&self, child: &BranchId) -> Result<Vec<RelocationRequest>>;

    /// Conditional insert; `Conflict` if the pair is already pending
    fn create(&self, request: &RelocationRequest) -> Result<()>;

    fn delete(&self, parent: &BranchId, child: &BranchId) -> Result<()>;
}

/// External: who moderates a branch (notification fan-out only)
pub trait ModeratorRoster: Send + Sync {
    fn moderators_of(&self, branch: &BranchId) -> Result<BTreeSet<Username>>;
}

/// External: append-only moderation log
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &ModLogEntry) -> Result<()>;
}

/// External: user notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Handles to the three stores the tree engine mutates
#[derive(Clone)]
pub struct Stores {
    pub branches: Arc<dyn BranchStore>,
    pub tags: Arc<dyn TagStore>,
    pub requests: Arc<dyn RequestStore>,
}

impl Stores {
    pub fn new(
        branches: Arc<dyn BranchStore>,
        tags: Arc<dyn TagStore>,
        requests: Arc<dyn RequestStore>,
    ) -> Self {
        Self {
            branches,
            tags,
            requests,
        }
    }

    /// Fresh in-memory stores
    pub fn in_memory() -> Self {
        use crate::memory::{MemoryBranchStore, MemoryRequestStore, MemoryTagStore};
        Self::new(
            Arc::new(MemoryBranchStore::new()),
            Arc::new(MemoryTagStore::new()),
            Arc::new(MemoryRequestStore::new()),
        )
    }
}
