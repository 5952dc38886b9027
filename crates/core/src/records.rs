//! Index rows, relocation requests, and collaborator records

use crate::branch::{now_ms, BranchId, Username};
use crate::error::TreeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Closure-table row: `ancestor` is `branch` itself or one of its ancestors
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AncestorTag {
    pub branch: BranchId,
    pub ancestor: BranchId,
}

impl AncestorTag {
    pub fn new(branch: BranchId, ancestor: BranchId) -> Self {
        Self { branch, ancestor }
    }
}

impl fmt::Display for AncestorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} <- {})", self.branch, self.ancestor)
    }
}

/// Pending proposal to set `child.parent = parent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationRequest {
    pub parent: BranchId,
    pub child: BranchId,
    pub creator: Username,
    pub created_at_ms: u64,
}

impl RelocationRequest {
    pub fn new(parent: BranchId, child: BranchId, creator: impl Into<String>) -> Self {
        Self {
            parent,
            child,
            creator: creator.into(),
            created_at_ms: now_ms(),
        }
    }
}

/// Moderator decision on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl FromStr for Decision {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(TreeError::invalid(format!(
                "unknown decision '{}' (expected accept or reject)",
                other
            ))),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => f.write_str("accept"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

/// Kind of moderation log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModAction {
    CreateBranch,
    DeleteBranch,
    ProposeRelocation,
    /// Logged on the new parent when a child moves under it
    AcceptChild,
    /// Logged on the old parent when a child leaves it
    ReleaseChild,
    RejectRelocation,
    DetachBranch,
}

impl ModAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateBranch => "create-branch",
            Self::DeleteBranch => "delete-branch",
            Self::ProposeRelocation => "propose-relocation",
            Self::AcceptChild => "accept-child",
            Self::ReleaseChild => "release-child",
            Self::RejectRelocation => "reject-relocation",
            Self::DetachBranch => "detach-branch",
        }
    }
}

/// Append-only audit record for actions taken on a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModLogEntry {
    pub id: Ulid,
    pub branch: BranchId,
    pub actor: Username,
    pub timestamp_ms: u64,
    pub action: ModAction,
    pub payload: BTreeMap<String, String>,
}

impl ModLogEntry {
    pub fn new(branch: BranchId, actor: impl Into<String>, action: ModAction) -> Self {
        Self {
            id: Ulid::new(),
            branch,
            actor: actor.into(),
            timestamp_ms: now_ms(),
            action,
            payload: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.payload.insert(key.to_string(), value.to_string());
        self
    }
}

/// Kind of user notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    RelocationProposed,
    RelocationAccepted,
    RelocationRejected,
    BranchDetached,
    BranchDeleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelocationProposed => "relocation-proposed",
            Self::RelocationAccepted => "relocation-accepted",
            Self::RelocationRejected => "relocation-rejected",
            Self::BranchDetached => "branch-detached",
            Self::BranchDeleted => "branch-deleted",
        }
    }
}

/// Fire-and-forget notification for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub username: Username,
    pub kind: NotificationKind,
    pub payload: BTreeMap<String, String>,
    pub created_at_ms: u64,
}

impl Notification {
    pub fn new(username: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            username: username.into(),
            kind,
            payload: BTreeMap::new(),
            created_at_ms: now_ms(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.payload.insert(key.to_string(), value.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_parse() {
        assert_eq!("accept".parse::<Decision>().unwrap(), Decision::Accept);
        assert_eq!("reject".parse::<Decision>().unwrap(), Decision::Reject);
        assert!(matches!(
            "maybe".parse::<Decision>(),
            Err(TreeError::Invalid(_))
        ));
    }

    #[test]
    fn test_mod_log_payload_builder() {
        let entry = ModLogEntry::new("rust".into(), "alice", ModAction::AcceptChild)
            .with("child", "async")
            .with("subtree_size", 3);
        assert_eq!(entry.payload.get("child").map(String::as_str), Some("async"));
        assert_eq!(entry.payload.get("subtree_size").map(String::as_str), Some("3"));
    }
}
