//! In-memory implementations of the store and collaborator traits

use crate::branch::{Branch, BranchId, BranchPatch, Username};
use crate::error::{Result, TreeError};
use crate::records::{AncestorTag, ModLogEntry, Notification, RelocationRequest};
use crate::store::{AuditSink, BranchStore, ModeratorRoster, Notifier, RequestStore, TagStore};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};

/// Branch records in a map, with a parent -> children index
#[derive(Default)]
pub struct MemoryBranchStore {
    branches: RwLock<BTreeMap<BranchId, Branch>>,
    children: RwLock<BTreeMap<BranchId, BTreeSet<BranchId>>>,
    count: Mutex<u64>,
}

impl MemoryBranchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BranchStore for MemoryBranchStore {
    fn get(&self, id: &BranchId) -> Result<Option<Branch>> {
        Ok(self.branches.read().get(id).cloned())
    }

    fn create(&self, branch: &Branch) -> Result<()> {
        let mut branches = self.branches.write();
        if branches.contains_key(&branch.id) {
            return Err(TreeError::conflict(format!("branch '{}' already exists", branch.id)));
        }
        branches.insert(branch.id.clone(), branch.clone());
        drop(branches);

        if let Some(parent) = &branch.parent {
            self.children
                .write()
                .entry(parent.clone())
                .or_default()
                .insert(branch.id.clone());
        }
        Ok(())
    }

    fn update(&self, id: &BranchId, patch: &BranchPatch) -> Result<Branch> {
        let mut branches = self.branches.write();
        let branch = branches
            .get_mut(id)
            .ok_or_else(|| TreeError::not_found(format!("branch '{}'", id)))?;
        let old_parent = branch.parent.clone();
        branch.apply(patch);
        let updated = branch.clone();
        drop(branches);

        if old_parent != updated.parent {
            let mut children = self.children.write();
            if let Some(old) = &old_parent {
                if let Some(set) = children.get_mut(old) {
                    set.remove(id);
                }
            }
            if let Some(new) = &updated.parent {
                children.entry(new.clone()).or_default().insert(id.clone());
            }
        }
        Ok(updated)
    }

    fn delete(&self, id: &BranchId) -> Result<()> {
        let removed = self.branches.write().remove(id);
        if let Some(parent) = removed.and_then(|b| b.parent) {
            if let Some(set) = self.children.write().get_mut(&parent) {
                set.remove(id);
            }
        }
        Ok(())
    }

    fn children_of(&self, id: &BranchId) -> Result<BTreeSet<BranchId>> {
        Ok(self.children.read().get(id).cloned().unwrap_or_default())
    }

    fn rebuild_child_index(&self) -> Result<usize> {
        let mut expected: BTreeMap<BranchId, BTreeSet<BranchId>> = BTreeMap::new();
        for branch in self.branches.read().values() {
            if let Some(parent) = &branch.parent {
                expected.entry(parent.clone()).or_default().insert(branch.id.clone());
            }
        }

        let mut children = self.children.write();
        let mut changed = 0;
        for (parent, set) in children.iter() {
            let want = expected.get(parent);
            changed += set.iter().filter(|c| !want.is_some_and(|w| w.contains(*c))).count();
        }
        for (parent, set) in &expected {
            let have = children.get(parent);
            changed += set.iter().filter(|c| !have.is_some_and(|h| h.contains(*c))).count();
        }
        *children = expected;
        Ok(changed)
    }

    fn list(&self) -> Result<Vec<Branch>> {
        Ok(self.branches.read().values().cloned().collect())
    }

    fn count(&self) -> Result<u64> {
        Ok(*self.count.lock())
    }

    fn adjust_count(&self, delta: i64) -> Result<u64> {
        let mut count = self.count.lock();
        *count = if delta < 0 {
            count.saturating_sub(delta.unsigned_abs())
        } else {
            count.saturating_add(delta as u64)
        };
        Ok(*count)
    }
}

/// Closure rows held twice, keyed by branch and by ancestor
#[derive(Default)]
pub struct MemoryTagStore {
    by_branch: RwLock<BTreeMap<BranchId, BTreeSet<BranchId>>>,
    by_ancestor: RwLock<BTreeMap<BranchId, BTreeSet<BranchId>>>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TagStore for MemoryTagStore {
    fn query_by_branch(&self, branch: &BranchId) -> Result<BTreeSet<BranchId>> {
        Ok(self.by_branch.read().get(branch).cloned().unwrap_or_default())
    }

    fn query_by_ancestor(&self, ancestor: &BranchId) -> Result<BTreeSet<BranchId>> {
        Ok(self.by_ancestor.read().get(ancestor).cloned().unwrap_or_default())
    }

    fn put(&self, tag: &AncestorTag) -> Result<()> {
        self.by_branch
            .write()
            .entry(tag.branch.clone())
            .or_default()
            .insert(tag.ancestor.clone());
        self.by_ancestor
            .write()
            .entry(tag.ancestor.clone())
            .or_default()
            .insert(tag.branch.clone());
        Ok(())
    }

    fn delete(&self, tag: &AncestorTag) -> Result<()> {
        remove_pair(&mut self.by_branch.write(), &tag.branch, &tag.ancestor);
        remove_pair(&mut self.by_ancestor.write(), &tag.ancestor, &tag.branch);
        Ok(())
    }

    fn all_tags(&self) -> Result<Vec<AncestorTag>> {
        Ok(self
            .by_branch
            .read()
            .iter()
            .flat_map(|(branch, ancestors)| {
                ancestors
                    .iter()
                    .map(move |ancestor| AncestorTag::new(branch.clone(), ancestor.clone()))
            })
            .collect())
    }
}

fn remove_pair(map: &mut BTreeMap<BranchId, BTreeSet<BranchId>>, key: &BranchId, value: &BranchId) {
    if let Some(set) = map.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

/// Pending requests keyed by `(parent, child)`
#[derive(Default)]
pub struct MemoryRequestStore {
    requests: RwLock<BTreeMap<(BranchId, BranchId), RelocationRequest>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestStore for MemoryRequestStore {
    fn find(&self, parent: &BranchId, child: &BranchId) -> Result<Option<RelocationRequest>> {
        Ok(self
            .requests
            .read()
            .get(&(parent.clone(), child.clone()))
            .cloned())
    }

    fn find_all_for_parent(&self, parent: &BranchId) -> Result<Vec<RelocationRequest>> {
        Ok(self
            .requests
            .read()
            .values()
            .filter(|r| &r.parent == parent)
            .cloned()
            .collect())
    }

    fn find_all_for_child(&self, child: &BranchId) -> Result<Vec<RelocationRequest>> {
        Ok(self
            .requests
            .read()
            .values()
            .filter(|r| &r.child == child)
            .cloned()
            .collect())
    }

    fn create(&self, request: &RelocationRequest) -> Result<()> {
        let key = (request.parent.clone(), request.child.clone());
        let mut requests = self.requests.write();
        if requests.contains_key(&key) {
            return Err(TreeError::conflict(format!(
                "relocation of '{}' under '{}' is already pending",
                request.child, request.parent
            )));
        }
        requests.insert(key, request.clone());
        Ok(())
    }

    fn delete(&self, parent: &BranchId, child: &BranchId) -> Result<()> {
        self.requests.write().remove(&(parent.clone(), child.clone()));
        Ok(())
    }
}

/// Static moderator assignments
#[derive(Default)]
pub struct MemoryRoster {
    moderators: RwLock<BTreeMap<BranchId, BTreeSet<Username>>>,
}

impl MemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, branch: impl Into<BranchId>, username: impl Into<String>) {
        self.moderators
            .write()
            .entry(branch.into())
            .or_default()
            .insert(username.into());
    }
}

impl ModeratorRoster for MemoryRoster {
    fn moderators_of(&self, branch: &BranchId) -> Result<BTreeSet<Username>> {
        Ok(self.moderators.read().get(branch).cloned().unwrap_or_default())
    }
}

/// Collects appended moderation log entries
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<ModLogEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ModLogEntry> {
        self.entries.lock().clone()
    }

    pub fn for_branch(&self, branch: &BranchId) -> Vec<ModLogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| &e.branch == branch)
            .cloned()
            .collect()
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, entry: &ModLogEntry) -> Result<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Collects delivered notifications
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn for_user(&self, username: &str) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.username == username)
            .cloned()
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}
