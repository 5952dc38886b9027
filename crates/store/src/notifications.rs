//! Per-user notification inbox

use crate::db::{backend, decode, encode, pair_key, pair_prefix};
use canopy_core::{Notification, Notifier, Result, TreeError};
use sled::{Db, Tree};

/// sled-backed [`Notifier`]: notifications are queued per user until read
pub struct NotificationQueue {
    db: Db,
    /// username \0 seq -> notification
    inbox: Tree,
}

impl NotificationQueue {
    pub(crate) fn new(db: Db, inbox: Tree) -> Self {
        Self { db, inbox }
    }

    /// Queued notifications for a user, oldest first
    pub fn for_user(&self, username: &str) -> Result<Vec<Notification>> {
        let mut out = Vec::new();
        for item in self.inbox.scan_prefix(pair_prefix(username.as_bytes())) {
            let (_, value) = item.map_err(backend)?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    /// Remove and return a user's queued notifications
    pub fn drain_user(&self, username: &str) -> Result<Vec<Notification>> {
        let mut out = Vec::new();
        for item in self.inbox.scan_prefix(pair_prefix(username.as_bytes())) {
            let (key, value) = item.map_err(backend)?;
            out.push(decode(&value)?);
            self.inbox.remove(key).map_err(backend)?;
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.inbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inbox.is_empty()
    }
}

impl Notifier for NotificationQueue {
    fn notify(&self, notification: &Notification) -> Result<()> {
        if notification.username.contains('\0') {
            return Err(TreeError::invalid("username contains NUL"));
        }
        let seq = self.db.generate_id().map_err(backend)?.to_be_bytes();
        self.inbox
            .insert(
                pair_key(notification.username.as_bytes(), &seq),
                encode(notification)?,
            )
            .map_err(backend)?;
        Ok(())
    }
}
