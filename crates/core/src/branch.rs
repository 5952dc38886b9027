//! Branch records and identifiers

use crate::config::TreeConfig;
use crate::error::{Result, TreeError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Globally unique, immutable branch identifier (a lowercase slug)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(String);

impl BranchId {
    /// Validate user input against the id rules in `config`
    ///
    /// The configured root id is always accepted.
    pub fn parse(raw: &str, config: &TreeConfig) -> Result<Self> {
        if raw == config.root_id {
            return Ok(Self(raw.to_string()));
        }
        check_id_syntax(raw, config.max_id_len)?;
        if config.is_reserved(raw) {
            return Err(TreeError::invalid(format!("branch id '{}' is reserved", raw)));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Syntax-only check: length, charset, no whitespace
pub(crate) fn check_id_syntax(raw: &str, max_len: usize) -> Result<()> {
    if raw.is_empty() || raw.len() > max_len {
        return Err(TreeError::invalid(format!(
            "branch id must be 1-{} characters (got {})",
            max_len,
            raw.len()
        )));
    }
    if let Some(bad) = raw
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
    {
        return Err(TreeError::invalid(format!(
            "branch id '{}' contains invalid character {:?}",
            raw, bad
        )));
    }
    Ok(())
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BranchId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for BranchId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Unchecked conversion, for ids read back from storage or built in tests.
/// User input goes through [`BranchId::parse`].
impl From<&str> for BranchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BranchId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Usernames are opaque strings owned by the surrounding application
pub type Username = String;

/// Lifecycle of a branch record
///
/// Creation and deletion span several independent writes. The record carries
/// which of the two is in flight so a retry can tell an unfinished operation
/// from a finished one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchState {
    /// Record written; closure rows or the counter may still be missing
    Creating,
    #[default]
    Active,
    /// Children, rows and requests are being removed
    Deleting,
}

/// One node of the managed tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Immutable id
    pub id: BranchId,
    /// Display name
    pub name: String,
    /// Parent pointer; `None` only for the root branch
    pub parent: Option<BranchId>,
    /// Username of the creator
    pub creator: Username,
    /// Creation time (Unix milliseconds)
    pub created_at_ms: u64,
    /// Aggregate counters maintained outside the tree engine
    pub post_count: u64,
    pub post_points: i64,
    pub comment_count: u64,
    pub description: Option<String>,
    pub rules: Option<String>,
    pub state: BranchState,
}

impl Branch {
    /// New branch with zeroed counters
    pub fn new(id: BranchId, name: impl Into<String>, parent: Option<BranchId>, creator: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent,
            creator: creator.into(),
            created_at_ms: now_ms(),
            post_count: 0,
            post_points: 0,
            comment_count: 0,
            description: None,
            rules: None,
            state: BranchState::Active,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Apply the `Some` fields of a patch in place
    pub fn apply(&mut self, patch: &BranchPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(rules) = &patch.rules {
            self.rules = Some(rules.clone());
        }
        if let Some(parent) = &patch.parent {
            self.parent = Some(parent.clone());
        }
        if let Some(state) = patch.state {
            self.state = state;
        }
    }
}

/// Field update for [`crate::BranchStore::update`]; only `Some` fields change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rules: Option<String>,
    pub parent: Option<BranchId>,
    pub state: Option<BranchState>,
}

impl BranchPatch {
    pub fn parent(parent: BranchId) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn state(state: BranchState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.rules.is_none()
            && self.parent.is_none()
            && self.state.is_none()
    }
}

/// Caller-supplied fields for branch creation
#[derive(Debug, Clone, Default)]
pub struct NewBranch {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub rules: Option<String>,
}

/// Current Unix time in milliseconds
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_slugs() {
        let config = TreeConfig::default();
        assert!(BranchId::parse("rust", &config).is_ok());
        assert!(BranchId::parse("rust-lang_2", &config).is_ok());
        assert!(BranchId::parse(&"a".repeat(30), &config).is_ok());
    }

    #[test]
    fn test_parse_rejects_bad_ids() {
        let config = TreeConfig::default();
        assert!(BranchId::parse("", &config).is_err());
        assert!(BranchId::parse(&"a".repeat(31), &config).is_err());
        assert!(BranchId::parse("has space", &config).is_err());
        assert!(BranchId::parse("Upper", &config).is_err());
        assert!(BranchId::parse("tab\there", &config).is_err());
        assert!(BranchId::parse("admin", &config).is_err());
    }

    #[test]
    fn test_parse_always_accepts_root() {
        let config = TreeConfig::default();
        let root = BranchId::parse("root", &config).unwrap();
        assert_eq!(root.as_str(), "root");
    }

    #[test]
    fn test_patch_leaves_counters_alone() {
        let mut branch = Branch::new("rust".into(), "Rust", Some("root".into()), "alice");
        branch.post_count = 12;
        branch.comment_count = 40;
        branch.apply(&BranchPatch {
            name: Some("Rust Lang".to_string()),
            parent: Some("programming".into()),
            ..BranchPatch::default()
        });
        assert_eq!(branch.name, "Rust Lang");
        assert_eq!(branch.parent, Some(BranchId::from("programming")));
        assert_eq!(branch.post_count, 12);
        assert_eq!(branch.comment_count, 40);
        assert_eq!(branch.state, BranchState::Active);
    }

    #[test]
    fn test_state_patch() {
        let mut branch = Branch::new("rust".into(), "Rust", Some("root".into()), "alice");
        let patch = BranchPatch::state(BranchState::Deleting);
        assert!(!patch.is_empty());
        branch.apply(&patch);
        assert_eq!(branch.state, BranchState::Deleting);
        assert_eq!(branch.parent, Some(BranchId::from("root")));
    }
}
