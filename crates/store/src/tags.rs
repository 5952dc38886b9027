//! Closure-table rows, stored under two keys
//!
//! `tags_by_branch` answers "ancestors of X" and `tags_by_ancestor` answers
//! "descendants of X", each with a single prefix scan. The two rows of one tag
//! are independent writes; `put` writes the by-branch row first and `delete`
//! removes it last, so a half-applied write is healed by repeating it.

use crate::db::{backend, pair_key, pair_prefix, pair_suffix, split_pair, utf8_id};
use canopy_core::{AncestorTag, BranchId, Result, TagStore};
use sled::Tree;
use std::collections::BTreeSet;
use tracing::trace;

/// sled-backed [`TagStore`]
pub struct SledTagStore {
    by_branch: Tree,
    by_ancestor: Tree,
}

impl SledTagStore {
    pub(crate) fn new(by_branch: Tree, by_ancestor: Tree) -> Self {
        Self {
            by_branch,
            by_ancestor,
        }
    }

    fn scan(tree: &Tree, first: &BranchId) -> Result<BTreeSet<BranchId>> {
        let mut out = BTreeSet::new();
        for item in tree.scan_prefix(pair_prefix(first.as_bytes())) {
            let (key, _) = item.map_err(backend)?;
            out.insert(utf8_id(pair_suffix(&key)?)?);
        }
        Ok(out)
    }
}

impl TagStore for SledTagStore {
    fn query_by_branch(&self, branch: &BranchId) -> Result<BTreeSet<BranchId>> {
        Self::scan(&self.by_branch, branch)
    }

    fn query_by_ancestor(&self, ancestor: &BranchId) -> Result<BTreeSet<BranchId>> {
        Self::scan(&self.by_ancestor, ancestor)
    }

    fn put(&self, tag: &AncestorTag) -> Result<()> {
        trace!("put tag {}", tag);
        self.by_branch
            .insert(pair_key(tag.branch.as_bytes(), tag.ancestor.as_bytes()), &[] as &[u8])
            .map_err(backend)?;
        self.by_ancestor
            .insert(pair_key(tag.ancestor.as_bytes(), tag.branch.as_bytes()), &[] as &[u8])
            .map_err(backend)?;
        Ok(())
    }

    fn delete(&self, tag: &AncestorTag) -> Result<()> {
        trace!("delete tag {}", tag);
        self.by_ancestor
            .remove(pair_key(tag.ancestor.as_bytes(), tag.branch.as_bytes()))
            .map_err(backend)?;
        self.by_branch
            .remove(pair_key(tag.branch.as_bytes(), tag.ancestor.as_bytes()))
            .map_err(backend)?;
        Ok(())
    }

    fn all_tags(&self) -> Result<Vec<AncestorTag>> {
        let mut tags = Vec::new();
        for item in self.by_branch.iter() {
            let (key, _) = item.map_err(backend)?;
            let (branch, ancestor) = split_pair(&key)?;
            tags.push(AncestorTag::new(branch, ancestor));
        }
        Ok(tags)
    }
}
