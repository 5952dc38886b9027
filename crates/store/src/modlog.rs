//! Append-only moderation log using sled

use crate::db::{backend, decode, encode, pair_key, pair_prefix, pair_suffix};
use canopy_core::{AuditSink, BranchId, ModLogEntry, Result, TreeError};
use sled::{Db, Tree};

/// Append-only log of moderation actions, indexed by branch
pub struct ModLog {
    /// Source of monotonic sequence numbers
    db: Db,
    /// seq -> entry
    entries: Tree,
    /// branch \0 seq -> ()
    by_branch: Tree,
}

impl ModLog {
    pub(crate) fn new(db: Db, entries: Tree, by_branch: Tree) -> Self {
        Self {
            db,
            entries,
            by_branch,
        }
    }

    /// Newest `limit` entries for one branch, newest first
    pub fn for_branch(&self, branch: &BranchId, limit: usize) -> Result<Vec<ModLogEntry>> {
        let mut out = Vec::new();
        for item in self
            .by_branch
            .scan_prefix(pair_prefix(branch.as_bytes()))
            .rev()
            .take(limit)
        {
            let (key, _) = item.map_err(backend)?;
            let seq = pair_suffix(&key)?;
            if let Some(value) = self.entries.get(seq).map_err(backend)? {
                out.push(decode(&value)?);
            }
        }
        Ok(out)
    }

    /// Newest `limit` entries across all branches, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<ModLogEntry>> {
        let mut out = Vec::new();
        for item in self.entries.iter().rev().take(limit) {
            let (_, value) = item.map_err(backend)?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    /// Total number of entries
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

impl AuditSink for ModLog {
    fn append(&self, entry: &ModLogEntry) -> Result<()> {
        let seq = self.db.generate_id().map_err(backend)?.to_be_bytes();
        let value = encode(entry)?;

        self.entries.insert(seq, value).map_err(backend)?;
        self.by_branch
            .insert(pair_key(entry.branch.as_bytes(), &seq), &[] as &[u8])
            .map_err(backend)?;
        self.entries
            .flush()
            .map_err(|e| TreeError::backend(format!("flush mod log: {}", e)))?;
        Ok(())
    }
}
