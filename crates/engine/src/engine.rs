//! Tree engine: branch lifecycle on top of the three stores

use crate::events::{Outbox, TreeEvent};
use crate::index::AncestorIndex;
use crate::workflow::ProposalOutcome;
use canopy_core::{
    Branch, BranchId, BranchPatch, BranchState, NewBranch, Result, Stores, TreeConfig, TreeError,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Result of [`TreeEngine::create_branch`]
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    /// The branch as stored, attached under the root
    pub branch: Branch,
    /// Relocation towards the requested parent, if one was asked for
    pub proposal: Option<ProposalOutcome>,
}

/// Keeps branch parent pointers and the ancestor index consistent
///
/// Runs each operation as a sequence of independent store calls. There is
/// no locking and no rollback: an operation interrupted by a backend error
/// is completed by calling it again.
pub struct TreeEngine {
    pub(crate) stores: Stores,
    pub(crate) index: AncestorIndex,
    pub(crate) config: TreeConfig,
    pub(crate) root: BranchId,
    pub(crate) outbox: Outbox,
}

impl TreeEngine {
    pub fn new(stores: Stores, config: TreeConfig, outbox: Outbox) -> Result<Self> {
        config.validate()?;
        let root = BranchId::from(config.root_id.as_str());
        let index = AncestorIndex::new(stores.tags.clone());

        Ok(Self {
            stores,
            index,
            config,
            root,
            outbox,
        })
    }

    pub fn root_id(&self) -> &BranchId {
        &self.root
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn index(&self) -> &AncestorIndex {
        &self.index
    }

    /// Create the root branch and its self row if they are missing
    pub fn ensure_root(&self) -> Result<Branch> {
        let root = match self.stores.branches.get(&self.root)? {
            Some(root) => root,
            None => {
                let mut root =
                    Branch::new(self.root.clone(), "Root", None, &self.config.system_actor);
                root.state = BranchState::Creating;
                match self.stores.branches.create(&root) {
                    Ok(()) => root,
                    // Lost a race with another initializer
                    Err(TreeError::Conflict(_)) => self.get_branch(&self.root)?,
                    Err(e) => return Err(e),
                }
            }
        };
        self.index.tag_new_branch(&self.root, &BTreeSet::new())?;
        if root.state == BranchState::Creating {
            return self.finish_create(&root.id);
        }
        Ok(root)
    }

    /// Count a freshly tagged branch and mark it active
    ///
    /// The counter moves before the state flips, so a retry that still sees
    /// `Creating` has not counted the branch yet.
    fn finish_create(&self, id: &BranchId) -> Result<Branch> {
        self.stores.branches.adjust_count(1)?;
        let branch = self
            .stores
            .branches
            .update(id, &BranchPatch::state(BranchState::Active))?;
        info!("Created branch '{}'", id);
        Ok(branch)
    }

    /// Fetch a branch or fail with `NotFound`
    pub fn get_branch(&self, id: &BranchId) -> Result<Branch> {
        self.stores
            .branches
            .get(id)?
            .ok_or_else(|| TreeError::not_found(format!("branch '{}'", id)))
    }

    pub fn ancestors_of(&self, id: &BranchId) -> Result<BTreeSet<BranchId>> {
        self.index.ancestors_of(id)
    }

    pub fn descendants_of(&self, id: &BranchId) -> Result<BTreeSet<BranchId>> {
        self.index.descendants_of(id)
    }

    /// Direct children whose parent pointer names `id`
    ///
    /// The parent index can hold a row left behind by an interrupted move;
    /// the record decides.
    pub fn children_of(&self, id: &BranchId) -> Result<BTreeSet<BranchId>> {
        let mut children = self.stores.branches.children_of(id)?;
        let mut stale = Vec::new();
        for child in &children {
            let linked = self
                .stores
                .branches
                .get(child)?
                .is_some_and(|b| b.parent.as_ref() == Some(id));
            if !linked {
                stale.push(child.clone());
            }
        }
        for child in stale {
            debug!("ignoring stale index row {} -> {}", id, child);
            children.remove(&child);
        }
        Ok(children)
    }

    pub fn branch_count(&self) -> Result<u64> {
        self.stores.branches.count()
    }

    /// Create a branch under the root. With `target_parent` set to anything
    /// other than the root, a relocation request towards it is filed as the
    /// creator.
    pub fn create_branch(
        &self,
        new: NewBranch,
        creator: &str,
        target_parent: Option<&BranchId>,
    ) -> Result<CreateOutcome> {
        // 1. Validate everything before the first write
        let id = BranchId::parse(&new.id, &self.config)?;
        if id == self.root {
            return Err(TreeError::conflict(format!("'{}' is the root branch", id)));
        }
        if new.name.trim().is_empty() {
            return Err(TreeError::invalid("branch name must not be empty"));
        }
        if let Some(target) = target_parent {
            self.get_branch(target)?;
        }
        self.get_branch(&self.root)?;
        let root_ancestors = self.index.ancestors_of(&self.root)?;

        // 2. Branch record (conditional insert), or resume an unfinished create
        let branch = match self.stores.branches.get(&id)? {
            Some(existing) if existing.state == BranchState::Creating => {
                debug!("Resuming creation of '{}'", id);
                existing
            }
            Some(_) => {
                return Err(TreeError::conflict(format!("branch '{}' already exists", id)))
            }
            None => {
                let mut branch =
                    Branch::new(id.clone(), new.name, Some(self.root.clone()), creator);
                branch.description = new.description;
                branch.rules = new.rules;
                branch.state = BranchState::Creating;
                self.stores.branches.create(&branch)?;
                branch
            }
        };

        // 3. Ancestor rows, then the counter and the state flip
        let parent = branch.parent.clone().unwrap_or_else(|| self.root.clone());
        let parent_ancestors = if parent == self.root {
            root_ancestors
        } else {
            self.index.ancestors_of(&parent)?
        };
        self.index.tag_new_branch(&id, &parent_ancestors)?;
        let branch = self.finish_create(&id)?;

        self.outbox.publish(TreeEvent::BranchCreated {
            branch: id.clone(),
            parent: self.root.clone(),
            actor: creator.to_string(),
        });

        // 4. Ask to move under the requested parent
        let proposal = match target_parent {
            Some(target) if target != &self.root => Some(self.propose(target, &id, creator)?),
            _ => None,
        };

        Ok(CreateOutcome { branch, proposal })
    }

    /// Change display metadata. Parent changes go through the request workflow.
    pub fn update_metadata(&self, id: &BranchId, patch: &BranchPatch) -> Result<Branch> {
        if patch.parent.is_some() {
            return Err(TreeError::invalid(
                "parent changes must go through propose/decide",
            ));
        }
        if patch.state.is_some() {
            return Err(TreeError::invalid("branch state is managed by the engine"));
        }
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(TreeError::invalid("branch name must not be empty"));
        }
        self.stores.branches.update(id, patch)
    }
}
