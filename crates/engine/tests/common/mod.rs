//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use canopy_core::memory::{MemoryAuditLog, MemoryNotifier, MemoryRoster};
use canopy_core::{
    AncestorTag, AuditSink, Branch, BranchId, BranchPatch, BranchStore, ModeratorRoster,
    NewBranch, Notifier, Result, Stores, TagStore, TreeConfig, TreeError,
};
use canopy_engine::{EventDispatcher, Outbox, TreeEngine};
use canopy_store::SledStore;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Which store implementation backs a harness
#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    Sled,
}

pub const BACKENDS: [Backend; 2] = [Backend::Memory, Backend::Sled];

/// An engine plus the collaborators its events are delivered to
pub struct Harness {
    pub engine: TreeEngine,
    pub dispatcher: EventDispatcher,
    pub audit: Arc<MemoryAuditLog>,
    pub notifier: Arc<MemoryNotifier>,
    pub roster: Arc<MemoryRoster>,
    // Keeps the sled database alive for the harness lifetime
    _sled: Option<SledStore>,
}

impl Harness {
    pub fn new(backend: Backend) -> Self {
        match backend {
            Backend::Memory => Self::with_stores(Stores::in_memory(), None),
            Backend::Sled => {
                let db = SledStore::temporary().unwrap();
                Self::with_stores(db.stores(), Some(db))
            }
        }
    }

    /// Harness over caller-built stores, e.g. with a failing tag store
    pub fn with_stores(stores: Stores, sled: Option<SledStore>) -> Self {
        let (outbox, rx) = Outbox::channel();
        let audit = Arc::new(MemoryAuditLog::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let roster = Arc::new(MemoryRoster::new());
        let config = TreeConfig::default();
        let dispatcher = EventDispatcher::new(
            rx,
            audit.clone() as Arc<dyn AuditSink>,
            notifier.clone() as Arc<dyn Notifier>,
            roster.clone() as Arc<dyn ModeratorRoster>,
            BranchId::from(config.root_id.as_str()),
        );
        let engine = TreeEngine::new(stores, config, outbox).unwrap();
        engine.ensure_root().unwrap();

        Self {
            engine,
            dispatcher,
            audit,
            notifier,
            roster,
            _sled: sled,
        }
    }

    /// Create a root-level branch
    pub fn create(&self, id: &str) {
        self.engine
            .create_branch(new_branch(id), "founder", None)
            .unwrap();
    }

    /// Create `id` and move it under `parent` through propose/accept
    pub fn create_under(&self, id: &str, parent: &str) {
        self.create(id);
        if parent != "root" {
            self.engine
                .propose(&parent.into(), &id.into(), "founder")
                .unwrap();
            self.engine
                .decide(
                    &parent.into(),
                    &id.into(),
                    "founder",
                    canopy_core::Decision::Accept,
                )
                .unwrap();
        }
    }

    pub fn ancestors(&self, id: &str) -> BTreeSet<BranchId> {
        self.engine.ancestors_of(&id.into()).unwrap()
    }

    pub fn descendants(&self, id: &str) -> BTreeSet<BranchId> {
        self.engine.descendants_of(&id.into()).unwrap()
    }

    pub fn parent(&self, id: &str) -> Option<BranchId> {
        self.engine.get_branch(&id.into()).unwrap().parent
    }

    /// Panic with the violations if the tree is inconsistent
    pub fn assert_consistent(&self) {
        let report = self.engine.verify().unwrap();
        assert!(
            report.is_clean(),
            "tree is inconsistent: {:#?}",
            report.violations
        );
    }
}

pub fn new_branch(id: &str) -> NewBranch {
    NewBranch {
        id: id.to_string(),
        name: format!("Branch {}", id),
        ..NewBranch::default()
    }
}

pub fn ids(list: &[&str]) -> BTreeSet<BranchId> {
    list.iter().map(|s| BranchId::from(*s)).collect()
}

/// Tag store wrapper counting writes
pub struct CountingTagStore {
    inner: Arc<dyn TagStore>,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CountingTagStore {
    pub fn new(inner: Arc<dyn TagStore>) -> Self {
        Self {
            inner,
            puts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.puts.load(Ordering::SeqCst) + self.deletes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.puts.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
    }
}

impl TagStore for CountingTagStore {
    fn query_by_branch(&self, branch: &BranchId) -> Result<BTreeSet<BranchId>> {
        self.inner.query_by_branch(branch)
    }

    fn query_by_ancestor(&self, ancestor: &BranchId) -> Result<BTreeSet<BranchId>> {
        self.inner.query_by_ancestor(ancestor)
    }

    fn put(&self, tag: &AncestorTag) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(tag)
    }

    fn delete(&self, tag: &AncestorTag) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(tag)
    }

    fn all_tags(&self) -> Result<Vec<AncestorTag>> {
        self.inner.all_tags()
    }
}

/// Tag store that fails every write once `budget` writes have gone through,
/// until it is healed
pub struct FlakyTagStore {
    inner: Arc<dyn TagStore>,
    budget: AtomicUsize,
    armed: AtomicBool,
}

impl FlakyTagStore {
    pub fn new(inner: Arc<dyn TagStore>) -> Self {
        Self {
            inner,
            budget: AtomicUsize::new(0),
            armed: AtomicBool::new(false),
        }
    }

    /// Allow `writes` more writes, then fail
    pub fn fail_after(&self, writes: usize) {
        self.budget.store(writes, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if !self.armed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(TreeError::backend("injected tag store failure"));
        }
        self.budget.store(left - 1, Ordering::SeqCst);
        Ok(())
    }
}

impl TagStore for FlakyTagStore {
    fn query_by_branch(&self, branch: &BranchId) -> Result<BTreeSet<BranchId>> {
        self.inner.query_by_branch(branch)
    }

    fn query_by_ancestor(&self, ancestor: &BranchId) -> Result<BTreeSet<BranchId>> {
        self.inner.query_by_ancestor(ancestor)
    }

    fn put(&self, tag: &AncestorTag) -> Result<()> {
        self.check()?;
        self.inner.put(tag)
    }

    fn delete(&self, tag: &AncestorTag) -> Result<()> {
        self.check()?;
        self.inner.delete(tag)
    }

    fn all_tags(&self) -> Result<Vec<AncestorTag>> {
        self.inner.all_tags()
    }
}

/// Branch store calls that [`FlakyBranchStore`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BranchOp {
    Create,
    Update,
    Delete,
    AdjustCount,
}

/// Branch store whose armed operations fail until healed
pub struct FlakyBranchStore {
    inner: Arc<dyn BranchStore>,
    failing: Mutex<BTreeSet<BranchOp>>,
}

impl FlakyBranchStore {
    pub fn new(inner: Arc<dyn BranchStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn fail(&self, op: BranchOp) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn check(&self, op: BranchOp) -> Result<()> {
        if self.failing.lock().unwrap().contains(&op) {
            return Err(TreeError::backend(format!("injected {:?} failure", op)));
        }
        Ok(())
    }
}

impl BranchStore for FlakyBranchStore {
    fn get(&self, id: &BranchId) -> Result<Option<Branch>> {
        self.inner.get(id)
    }

    fn create(&self, branch: &Branch) -> Result<()> {
        self.check(BranchOp::Create)?;
        self.inner.create(branch)
    }

    fn update(&self, id: &BranchId, patch: &BranchPatch) -> Result<Branch> {
        self.check(BranchOp::Update)?;
        self.inner.update(id, patch)
    }

    fn delete(&self, id: &BranchId) -> Result<()> {
        self.check(BranchOp::Delete)?;
        self.inner.delete(id)
    }

    fn children_of(&self, id: &BranchId) -> Result<BTreeSet<BranchId>> {
        self.inner.children_of(id)
    }

    fn rebuild_child_index(&self) -> Result<usize> {
        self.inner.rebuild_child_index()
    }

    fn list(&self) -> Result<Vec<Branch>> {
        self.inner.list()
    }

    fn count(&self) -> Result<u64> {
        self.inner.count()
    }

    fn adjust_count(&self, delta: i64) -> Result<u64> {
        self.check(BranchOp::AdjustCount)?;
        self.inner.adjust_count(delta)
    }
}
