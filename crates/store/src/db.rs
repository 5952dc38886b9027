//! Database handle and key/value encoding helpers
//!
//! ## Layout
//!
//! One sled tree per table or secondary index. Composite keys join their
//! parts with a NUL byte, which branch ids can never contain, so a prefix
//! scan on `part1 \0` returns exactly the rows for `part1`.
//!
//! | tree | key | value |
//! |---|---|---|
//! | `branches` | `id` | bincode `Branch` |
//! | `idx_children` | `parent \0 child` | empty |
//! | `tags_by_branch` | `branch \0 ancestor` | empty |
//! | `tags_by_ancestor` | `ancestor \0 branch` | empty |
//! | `requests` | `parent \0 child` | bincode `RelocationRequest` |
//! | `idx_requests_by_child` | `child \0 parent` | empty |
//! | `meta` | `branch_count` | u64 big-endian |
//! | `modlog` | seq (u64 big-endian) | bincode `ModLogEntry` |
//! | `idx_modlog_by_branch` | `branch \0 seq` | empty |
//! | `moderators` | `branch \0 username` | empty |
//! | `notifications` | `username \0 seq` | bincode `Notification` |

use crate::branches::SledBranchStore;
use crate::modlog::ModLog;
use crate::notifications::NotificationQueue;
use crate::requests::SledRequestStore;
use crate::roster::Roster;
use crate::tags::SledTagStore;
use canopy_core::{BranchId, Result, Stores, TreeError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Database file name inside the data directory
pub const DB_FILE: &str = "canopy.db";

pub(crate) const TREE_BRANCHES: &str = "branches";
pub(crate) const TREE_IDX_CHILDREN: &str = "idx_children";
pub(crate) const TREE_TAGS_BY_BRANCH: &str = "tags_by_branch";
pub(crate) const TREE_TAGS_BY_ANCESTOR: &str = "tags_by_ancestor";
pub(crate) const TREE_REQUESTS: &str = "requests";
pub(crate) const TREE_IDX_REQUESTS_BY_CHILD: &str = "idx_requests_by_child";
pub(crate) const TREE_META: &str = "meta";
pub(crate) const TREE_MODLOG: &str = "modlog";
pub(crate) const TREE_IDX_MODLOG_BY_BRANCH: &str = "idx_modlog_by_branch";
pub(crate) const TREE_MODERATORS: &str = "moderators";
pub(crate) const TREE_NOTIFICATIONS: &str = "notifications";

const SEPARATOR: u8 = 0;

/// All persistent state for one tree, backed by a single sled database
pub struct SledStore {
    db: Db,
    branches: Arc<SledBranchStore>,
    tags: Arc<SledTagStore>,
    requests: Arc<SledRequestStore>,
    modlog: Arc<ModLog>,
    roster: Arc<Roster>,
    notifications: Arc<NotificationQueue>,
}

impl SledStore {
    /// Open or create the store in `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self> {
        let db = sled::open(data_dir.join(DB_FILE)).map_err(backend)?;
        info!("Opened branch store at {}", data_dir.display());
        Self::from_db(db)
    }

    /// Throwaway store that is removed on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open().map_err(backend)?;
        Self::from_db(db)
    }

    /// Build the store over an already opened database
    pub fn from_db(db: Db) -> Result<Self> {
        let tree = |name: &str| db.open_tree(name).map_err(backend);

        Ok(Self {
            branches: Arc::new(SledBranchStore::new(
                tree(TREE_BRANCHES)?,
                tree(TREE_IDX_CHILDREN)?,
                tree(TREE_META)?,
            )),
            tags: Arc::new(SledTagStore::new(
                tree(TREE_TAGS_BY_BRANCH)?,
                tree(TREE_TAGS_BY_ANCESTOR)?,
            )),
            requests: Arc::new(SledRequestStore::new(
                tree(TREE_REQUESTS)?,
                tree(TREE_IDX_REQUESTS_BY_CHILD)?,
            )),
            modlog: Arc::new(ModLog::new(
                db.clone(),
                tree(TREE_MODLOG)?,
                tree(TREE_IDX_MODLOG_BY_BRANCH)?,
            )),
            roster: Arc::new(Roster::new(tree(TREE_MODERATORS)?)),
            notifications: Arc::new(NotificationQueue::new(
                db.clone(),
                tree(TREE_NOTIFICATIONS)?,
            )),
            db,
        })
    }

    /// Handles for the tree engine
    pub fn stores(&self) -> Stores {
        Stores::new(
            self.branches.clone(),
            self.tags.clone(),
            self.requests.clone(),
        )
    }

    pub fn branches(&self) -> Arc<SledBranchStore> {
        self.branches.clone()
    }

    pub fn tags(&self) -> Arc<SledTagStore> {
        self.tags.clone()
    }

    pub fn requests(&self) -> Arc<SledRequestStore> {
        self.requests.clone()
    }

    pub fn modlog(&self) -> Arc<ModLog> {
        self.modlog.clone()
    }

    pub fn roster(&self) -> Arc<Roster> {
        self.roster.clone()
    }

    pub fn notifications(&self) -> Arc<NotificationQueue> {
        self.notifications.clone()
    }

    /// Flush all trees to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(backend)?;
        Ok(())
    }
}

/// Map any sled failure to the retryable backend error
pub(crate) fn backend(err: sled::Error) -> TreeError {
    TreeError::backend(format!("sled: {}", err))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| TreeError::corrupt(format!("encode: {}", e)))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| TreeError::corrupt(format!("decode: {}", e)))
}

/// `first \0 second`
pub(crate) fn pair_key(first: &[u8], second: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(first.len() + 1 + second.len());
    key.extend_from_slice(first);
    key.push(SEPARATOR);
    key.extend_from_slice(second);
    key
}

/// `first \0`, the scan prefix for every pair starting with `first`
pub(crate) fn pair_prefix(first: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(first.len() + 1);
    key.extend_from_slice(first);
    key.push(SEPARATOR);
    key
}

/// The part after the separator, for keys produced by [`pair_key`]
pub(crate) fn pair_suffix(key: &[u8]) -> Result<&[u8]> {
    key.iter()
        .position(|&b| b == SEPARATOR)
        .map(|pos| &key[pos + 1..])
        .ok_or_else(|| TreeError::corrupt("index key without separator"))
}

pub(crate) fn utf8_id(bytes: &[u8]) -> Result<BranchId> {
    std::str::from_utf8(bytes)
        .map(BranchId::from)
        .map_err(|e| TreeError::corrupt(format!("branch id is not UTF-8: {}", e)))
}

/// Split a `first \0 second` key into two branch ids
pub(crate) fn split_pair(key: &[u8]) -> Result<(BranchId, BranchId)> {
    let pos = key
        .iter()
        .position(|&b| b == SEPARATOR)
        .ok_or_else(|| TreeError::corrupt("index key without separator"))?;
    Ok((utf8_id(&key[..pos])?, utf8_id(&key[pos + 1..])?))
}
