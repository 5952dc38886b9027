//! Branch records and the parent -> children index

use crate::db::{backend, decode, encode, pair_key, pair_prefix, pair_suffix, utf8_id};
use canopy_core::{Branch, BranchId, BranchPatch, BranchStore, Result, TreeError};
use sled::Tree;
use std::collections::BTreeSet;
use tracing::debug;

const META_BRANCH_COUNT: &[u8] = b"branch_count";

/// sled-backed [`BranchStore`]
pub struct SledBranchStore {
    branches: Tree,
    children: Tree,
    meta: Tree,
}

impl SledBranchStore {
    pub(crate) fn new(branches: Tree, children: Tree, meta: Tree) -> Self {
        Self {
            branches,
            children,
            meta,
        }
    }

    fn link_child(&self, parent: &BranchId, child: &BranchId) -> Result<()> {
        self.children
            .insert(pair_key(parent.as_bytes(), child.as_bytes()), &[] as &[u8])
            .map_err(backend)?;
        Ok(())
    }

    fn unlink_child(&self, parent: &BranchId, child: &BranchId) -> Result<()> {
        self.children
            .remove(pair_key(parent.as_bytes(), child.as_bytes()))
            .map_err(backend)?;
        Ok(())
    }
}

impl BranchStore for SledBranchStore {
    fn get(&self, id: &BranchId) -> Result<Option<Branch>> {
        match self.branches.get(id.as_bytes()).map_err(backend)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn create(&self, branch: &Branch) -> Result<()> {
        // Index row first: a failure after it leaves a row the record does
        // not back, never a record the index misses
        if let Some(parent) = &branch.parent {
            self.link_child(parent, &branch.id)?;
        }

        let value = encode(branch)?;
        let swapped = self
            .branches
            .compare_and_swap(branch.id.as_bytes(), None as Option<&[u8]>, Some(value))
            .map_err(backend)?;
        if let Err(existing) = swapped {
            if let (Some(parent), Some(current)) = (&branch.parent, existing.current) {
                let current: Branch = decode(&current)?;
                if current.parent.as_ref() != Some(parent) {
                    self.unlink_child(parent, &branch.id)?;
                }
            }
            return Err(TreeError::conflict(format!(
                "branch '{}' already exists",
                branch.id
            )));
        }
        debug!("Created branch record {}", branch.id);
        Ok(())
    }

    fn update(&self, id: &BranchId, patch: &BranchPatch) -> Result<Branch> {
        let current = self
            .branches
            .get(id.as_bytes())
            .map_err(backend)?
            .ok_or_else(|| TreeError::not_found(format!("branch '{}'", id)))?;

        let old: Branch = decode(&current)?;
        let mut updated = old.clone();
        updated.apply(patch);
        let moved = old.parent != updated.parent;

        // New parent's row before the pointer, old parent's row after it
        if moved {
            if let Some(parent) = &updated.parent {
                self.link_child(parent, id)?;
            }
        }

        // Single-record conditional write: fails if someone else changed it meanwhile
        let swapped = self
            .branches
            .compare_and_swap(id.as_bytes(), Some(&current), Some(encode(&updated)?))
            .map_err(backend)?;
        if swapped.is_err() {
            return Err(TreeError::backend(format!(
                "branch '{}' changed during update",
                id
            )));
        }

        if moved {
            if let Some(parent) = &old.parent {
                self.unlink_child(parent, id)?;
            }
        }
        Ok(updated)
    }

    fn delete(&self, id: &BranchId) -> Result<()> {
        if let Some(bytes) = self.branches.remove(id.as_bytes()).map_err(backend)? {
            let branch: Branch = decode(&bytes)?;
            if let Some(parent) = &branch.parent {
                self.unlink_child(parent, id)?;
            }
        }
        Ok(())
    }

    fn children_of(&self, id: &BranchId) -> Result<BTreeSet<BranchId>> {
        let mut children = BTreeSet::new();
        for item in self.children.scan_prefix(pair_prefix(id.as_bytes())) {
            let (key, _) = item.map_err(backend)?;
            children.insert(utf8_id(pair_suffix(&key)?)?);
        }
        Ok(children)
    }

    fn rebuild_child_index(&self) -> Result<usize> {
        let mut expected = BTreeSet::new();
        for item in self.branches.iter() {
            let (_, value) = item.map_err(backend)?;
            let branch: Branch = decode(&value)?;
            if let Some(parent) = &branch.parent {
                expected.insert(pair_key(parent.as_bytes(), branch.id.as_bytes()));
            }
        }

        let mut changed = 0;
        for item in self.children.iter() {
            let (key, _) = item.map_err(backend)?;
            if !expected.remove(key.as_ref()) {
                self.children.remove(&key).map_err(backend)?;
                changed += 1;
            }
        }
        for key in expected {
            self.children.insert(key, &[] as &[u8]).map_err(backend)?;
            changed += 1;
        }
        if changed > 0 {
            debug!("Rebuilt child index: {} row(s) changed", changed);
        }
        Ok(changed)
    }

    fn list(&self) -> Result<Vec<Branch>> {
        let mut branches = Vec::new();
        for item in self.branches.iter() {
            let (_, value) = item.map_err(backend)?;
            branches.push(decode(&value)?);
        }
        Ok(branches)
    }

    fn count(&self) -> Result<u64> {
        Ok(self
            .meta
            .get(META_BRANCH_COUNT)
            .map_err(backend)?
            .map(|v| read_u64(&v))
            .unwrap_or(0))
    }

    fn adjust_count(&self, delta: i64) -> Result<u64> {
        let updated = self
            .meta
            .update_and_fetch(META_BRANCH_COUNT, |old| {
                let current = old.map(read_u64).unwrap_or(0);
                let next = if delta < 0 {
                    current.saturating_sub(delta.unsigned_abs())
                } else {
                    current.saturating_add(delta as u64)
                };
                Some(next.to_be_bytes().to_vec())
            })
            .map_err(backend)?;
        Ok(updated.map(|v| read_u64(&v)).unwrap_or(0))
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    bytes
        .try_into()
        .map(u64::from_be_bytes)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use crate::db::pair_key;
    use crate::SledStore;
    use canopy_core::{Branch, BranchId, BranchPatch, BranchStore, TreeError};
    use std::collections::BTreeSet;

    fn id(s: &str) -> BranchId {
        BranchId::from(s)
    }

    #[test]
    fn test_create_get_and_duplicate() {
        let store = SledStore::temporary().unwrap();
        let branches = store.branches();

        let rust = Branch::new(id("rust"), "Rust", Some(id("root")), "alice");
        branches.create(&rust).unwrap();
        assert_eq!(branches.get(&id("rust")).unwrap(), Some(rust.clone()));
        assert!(matches!(branches.create(&rust), Err(TreeError::Conflict(_))));
        assert!(branches.get(&id("go")).unwrap().is_none());
    }

    #[test]
    fn test_parent_change_moves_child_index() {
        let store = SledStore::temporary().unwrap();
        let branches = store.branches();
        branches
            .create(&Branch::new(id("lang"), "Languages", Some(id("root")), "alice"))
            .unwrap();
        branches
            .create(&Branch::new(id("rust"), "Rust", Some(id("root")), "alice"))
            .unwrap();
        assert_eq!(
            branches.children_of(&id("root")).unwrap(),
            BTreeSet::from([id("lang"), id("rust")])
        );

        let updated = branches
            .update(&id("rust"), &BranchPatch::parent(id("lang")))
            .unwrap();
        assert_eq!(updated.parent, Some(id("lang")));
        assert_eq!(branches.children_of(&id("root")).unwrap(), BTreeSet::from([id("lang")]));
        assert_eq!(branches.children_of(&id("lang")).unwrap(), BTreeSet::from([id("rust")]));
    }

    #[test]
    fn test_rebuild_child_index_fixes_stale_rows() {
        let store = SledStore::temporary().unwrap();
        let branches = store.branches();
        branches
            .create(&Branch::new(id("lang"), "Languages", Some(id("root")), "alice"))
            .unwrap();
        branches
            .create(&Branch::new(id("rust"), "Rust", Some(id("lang")), "alice"))
            .unwrap();

        // An interrupted move: the old parent's row was never removed and
        // the new one never written
        branches
            .children
            .insert(pair_key(b"root", b"rust"), &[] as &[u8])
            .unwrap();
        branches.children.remove(pair_key(b"lang", b"rust")).unwrap();
        assert_eq!(
            branches.children_of(&id("root")).unwrap(),
            BTreeSet::from([id("lang"), id("rust")])
        );

        assert_eq!(branches.rebuild_child_index().unwrap(), 2);
        assert_eq!(branches.children_of(&id("root")).unwrap(), BTreeSet::from([id("lang")]));
        assert_eq!(branches.children_of(&id("lang")).unwrap(), BTreeSet::from([id("rust")]));
        assert_eq!(branches.rebuild_child_index().unwrap(), 0);
    }

    #[test]
    fn test_conflicting_create_keeps_index() {
        let store = SledStore::temporary().unwrap();
        let branches = store.branches();
        branches
            .create(&Branch::new(id("rust"), "Rust", Some(id("lang")), "alice"))
            .unwrap();
        let duplicate = Branch::new(id("rust"), "Rust", Some(id("root")), "bob");
        assert!(matches!(branches.create(&duplicate), Err(TreeError::Conflict(_))));
        assert!(branches.children_of(&id("root")).unwrap().is_empty());
        assert_eq!(branches.children_of(&id("lang")).unwrap(), BTreeSet::from([id("rust")]));
    }

    #[test]
    fn test_children_prefix_is_exact() {
        let store = SledStore::temporary().unwrap();
        let branches = store.branches();
        branches
            .create(&Branch::new(id("a"), "A", Some(id("ab")), "alice"))
            .unwrap();
        branches
            .create(&Branch::new(id("b"), "B", Some(id("a")), "alice"))
            .unwrap();
        assert_eq!(branches.children_of(&id("a")).unwrap(), BTreeSet::from([id("b")]));
    }

    #[test]
    fn test_update_preserves_counters() {
        let store = SledStore::temporary().unwrap();
        let branches = store.branches();
        let mut rust = Branch::new(id("rust"), "Rust", Some(id("root")), "alice");
        rust.post_count = 7;
        rust.post_points = -3;
        branches.create(&rust).unwrap();

        let updated = branches
            .update(
                &id("rust"),
                &BranchPatch {
                    description: Some("Systems programming".to_string()),
                    ..BranchPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.post_count, 7);
        assert_eq!(updated.post_points, -3);
        assert_eq!(updated.description.as_deref(), Some("Systems programming"));
    }

    #[test]
    fn test_delete_unlinks_and_tolerates_missing() {
        let store = SledStore::temporary().unwrap();
        let branches = store.branches();
        branches
            .create(&Branch::new(id("rust"), "Rust", Some(id("root")), "alice"))
            .unwrap();
        branches.delete(&id("rust")).unwrap();
        branches.delete(&id("rust")).unwrap();
        assert!(branches.children_of(&id("root")).unwrap().is_empty());
        assert!(branches.list().unwrap().is_empty());
    }

    #[test]
    fn test_counter() {
        let store = SledStore::temporary().unwrap();
        let branches = store.branches();
        assert_eq!(branches.count().unwrap(), 0);
        assert_eq!(branches.adjust_count(3).unwrap(), 3);
        assert_eq!(branches.adjust_count(-1).unwrap(), 2);
        assert_eq!(branches.adjust_count(-10).unwrap(), 0);
    }
}
