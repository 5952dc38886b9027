//! Moderator assignments per branch

use crate::db::{backend, pair_key, pair_prefix, pair_suffix};
use canopy_core::{BranchId, ModeratorRoster, Result, TreeError, Username};
use sled::Tree;
use std::collections::BTreeSet;

/// sled-backed [`ModeratorRoster`]
pub struct Roster {
    moderators: Tree,
}

impl Roster {
    pub(crate) fn new(moderators: Tree) -> Self {
        Self { moderators }
    }

    pub fn add_moderator(&self, branch: &BranchId, username: &str) -> Result<()> {
        if username.is_empty() || username.contains('\0') {
            return Err(TreeError::invalid(format!("bad username {:?}", username)));
        }
        self.moderators
            .insert(pair_key(branch.as_bytes(), username.as_bytes()), &[] as &[u8])
            .map_err(backend)?;
        Ok(())
    }

    /// Returns whether the user was a moderator
    pub fn remove_moderator(&self, branch: &BranchId, username: &str) -> Result<bool> {
        let removed = self
            .moderators
            .remove(pair_key(branch.as_bytes(), username.as_bytes()))
            .map_err(backend)?;
        Ok(removed.is_some())
    }
}

impl ModeratorRoster for Roster {
    fn moderators_of(&self, branch: &BranchId) -> Result<BTreeSet<Username>> {
        let mut out = BTreeSet::new();
        for item in self.moderators.scan_prefix(pair_prefix(branch.as_bytes())) {
            let (key, _) = item.map_err(backend)?;
            let name = String::from_utf8(pair_suffix(&key)?.to_vec())
                .map_err(|e| TreeError::corrupt(format!("username is not UTF-8: {}", e)))?;
            out.insert(name);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::SledStore;
    use canopy_core::{BranchId, ModeratorRoster};
    use std::collections::BTreeSet;

    #[test]
    fn test_add_list_remove() {
        let store = SledStore::temporary().unwrap();
        let roster = store.roster();
        let rust = BranchId::from("rust");

        roster.add_moderator(&rust, "alice").unwrap();
        roster.add_moderator(&rust, "bob").unwrap();
        roster.add_moderator(&BranchId::from("go"), "carol").unwrap();

        assert_eq!(
            roster.moderators_of(&rust).unwrap(),
            BTreeSet::from(["alice".to_string(), "bob".to_string()])
        );
        assert!(roster.remove_moderator(&rust, "alice").unwrap());
        assert!(!roster.remove_moderator(&rust, "alice").unwrap());
        assert_eq!(roster.moderators_of(&rust).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_empty_username() {
        let store = SledStore::temporary().unwrap();
        assert!(store.roster().add_moderator(&"rust".into(), "").is_err());
    }
}
