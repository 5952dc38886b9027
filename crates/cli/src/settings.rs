//! Tree configuration file (`<data-dir>/config.toml`)

use anyhow::{Context, Result};
use canopy_core::TreeConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "config.toml";

/// Keys accepted by `canopy config get|set`
pub const KEYS: [&str; 4] = ["root_id", "max_id_len", "reserved_ids", "system_actor"];

pub fn config_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Load the configuration, falling back to defaults when the file is missing
pub fn load(data_dir: &Path) -> Result<TreeConfig> {
    let path = config_file_path(data_dir);
    if !path.exists() {
        debug!("no config at {}, using defaults", path.display());
        return Ok(TreeConfig::default());
    }

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    TreeConfig::from_toml_str(&text).with_context(|| format!("Invalid config in {}", path.display()))
}

/// Validate and write the configuration
pub fn save(data_dir: &Path, config: &TreeConfig) -> Result<()> {
    config.validate().context("Refusing to save invalid configuration")?;

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let path = config_file_path(data_dir);
    std::fs::write(&path, config.to_toml_string()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write the default configuration if no file exists yet
pub fn init_if_missing(data_dir: &Path) -> Result<TreeConfig> {
    if config_file_path(data_dir).exists() {
        return load(data_dir);
    }
    let config = TreeConfig::default();
    save(data_dir, &config)?;
    Ok(config)
}

/// Read one key as display text
pub fn get(config: &TreeConfig, key: &str) -> Result<String> {
    Ok(match key {
        "root_id" => config.root_id.clone(),
        "max_id_len" => config.max_id_len.to_string(),
        "reserved_ids" => config.reserved_ids.join(","),
        "system_actor" => config.system_actor.clone(),
        _ => anyhow::bail!(
            "Unknown config key: {}. Valid keys: {}",
            key,
            KEYS.join(", ")
        ),
    })
}

/// Set one key from its text form; the caller validates before saving
pub fn set(config: &mut TreeConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "root_id" => config.root_id = value.to_string(),
        "max_id_len" => {
            config.max_id_len = value
                .parse()
                .context("Invalid value: must be a positive integer")?;
        }
        "reserved_ids" => {
            config.reserved_ids = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        "system_actor" => config.system_actor = value.to_string(),
        _ => anyhow::bail!(
            "Unknown config key: {}. Valid keys: {}",
            key,
            KEYS.join(", ")
        ),
    }
    Ok(())
}
