//! Pending relocation requests keyed by `(parent, child)`

use crate::db::{backend, decode, encode, pair_key, pair_prefix, pair_suffix, utf8_id};
use canopy_core::{BranchId, RelocationRequest, RequestStore, Result, TreeError};
use sled::Tree;
use tracing::debug;

/// sled-backed [`RequestStore`]
pub struct SledRequestStore {
    requests: Tree,
    by_child: Tree,
}

impl SledRequestStore {
    pub(crate) fn new(requests: Tree, by_child: Tree) -> Self {
        Self { requests, by_child }
    }
}

impl RequestStore for SledRequestStore {
    fn find(&self, parent: &BranchId, child: &BranchId) -> Result<Option<RelocationRequest>> {
        match self
            .requests
            .get(pair_key(parent.as_bytes(), child.as_bytes()))
            .map_err(backend)?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn find_all_for_parent(&self, parent: &BranchId) -> Result<Vec<RelocationRequest>> {
        let mut found = Vec::new();
        for item in self.requests.scan_prefix(pair_prefix(parent.as_bytes())) {
            let (_, value) = item.map_err(backend)?;
            found.push(decode(&value)?);
        }
        Ok(found)
    }

    fn find_all_for_child(&self, child: &BranchId) -> Result<Vec<RelocationRequest>> {
        let mut found = Vec::new();
        for item in self.by_child.scan_prefix(pair_prefix(child.as_bytes())) {
            let (key, _) = item.map_err(backend)?;
            let parent = utf8_id(pair_suffix(&key)?)?;
            // Index row may outlive its request if a delete was interrupted
            if let Some(request) = self.find(&parent, child)? {
                found.push(request);
            }
        }
        Ok(found)
    }

    fn create(&self, request: &RelocationRequest) -> Result<()> {
        let key = pair_key(request.parent.as_bytes(), request.child.as_bytes());
        let swapped = self
            .requests
            .compare_and_swap(key, None as Option<&[u8]>, Some(encode(request)?))
            .map_err(backend)?;
        if swapped.is_err() {
            return Err(TreeError::conflict(format!(
                "relocation of '{}' under '{}' is already pending",
                request.child, request.parent
            )));
        }

        self.by_child
            .insert(
                pair_key(request.child.as_bytes(), request.parent.as_bytes()),
                &[] as &[u8],
            )
            .map_err(backend)?;
        debug!("Stored relocation request {} -> {}", request.child, request.parent);
        Ok(())
    }

    fn delete(&self, parent: &BranchId, child: &BranchId) -> Result<()> {
        self.requests
            .remove(pair_key(parent.as_bytes(), child.as_bytes()))
            .map_err(backend)?;
        self.by_child
            .remove(pair_key(child.as_bytes(), parent.as_bytes()))
            .map_err(backend)?;
        Ok(())
    }
}
