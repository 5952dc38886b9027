//! Tree configuration
//!
//! Stored as TOML next to the data directory:
//! ```toml
//! root_id = "root"
//! max_id_len = 30
//! reserved_ids = ["admin", "api", "new", "settings", "search", "all"]
//! system_actor = "system"
//! ```

use crate::error::{Result, TreeError};
use serde::{Deserialize, Serialize};

/// Upper bound accepted for `max_id_len`
pub const MAX_ID_LEN_LIMIT: usize = 64;

/// Configuration shared by every tree operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Id of the distinguished root branch
    pub root_id: String,
    /// Maximum branch id length (default: 30)
    pub max_id_len: usize,
    /// Ids that may never be used for a branch
    pub reserved_ids: Vec<String>,
    /// Actor recorded for system-initiated operations (detach on delete)
    pub system_actor: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            root_id: "root".to_string(),
            max_id_len: 30,
            reserved_ids: ["admin", "api", "new", "settings", "search", "all"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            system_actor: "system".to_string(),
        }
    }
}

impl TreeConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TreeConfig =
            toml::from_str(text).map_err(|e| TreeError::invalid(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| TreeError::invalid(format!("config: {}", e)))
    }

    /// Check value ranges and that the root id is itself a well-formed id
    pub fn validate(&self) -> Result<()> {
        if self.max_id_len == 0 || self.max_id_len > MAX_ID_LEN_LIMIT {
            return Err(TreeError::invalid(format!(
                "max_id_len must be between 1 and {} (got {})",
                MAX_ID_LEN_LIMIT, self.max_id_len
            )));
        }
        if self.reserved_ids.iter().any(|r| r == &self.root_id) {
            return Err(TreeError::invalid(format!(
                "root_id '{}' is listed as reserved",
                self.root_id
            )));
        }
        if self.system_actor.trim().is_empty() {
            return Err(TreeError::invalid("system_actor must not be empty"));
        }
        crate::branch::check_id_syntax(&self.root_id, self.max_id_len)
    }

    /// Whether `id` is in the reserved list
    pub fn is_reserved(&self, id: &str) -> bool {
        self.reserved_ids.iter().any(|r| r == id)
    }
}
