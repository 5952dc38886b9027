//! Configuration management command
//!
//! Provides CLI interface to view and edit `<data-dir>/config.toml`.

use crate::session::GlobalArgs;
use crate::settings;
use crate::util;
use anyhow::{Context, Result};
use canopy_core::config::MAX_ID_LEN_LIMIT;
use owo_colors::OwoColorize;

/// List all configuration values
pub fn run_list(global: &GlobalArgs) -> Result<()> {
    let config = settings::load(&global.data_dir)?;
    if global.json {
        return util::print_json(&config);
    }

    let config_path = settings::config_file_path(&global.data_dir);
    println!("{}", "Tree Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    println!("  {} = {}", "root_id".cyan(), config.root_id);
    println!(
        "  {} = {} {}",
        "max_id_len".cyan(),
        config.max_id_len,
        format!("(1-{})", MAX_ID_LEN_LIMIT).dimmed()
    );
    println!("  {} = {}", "reserved_ids".cyan(), config.reserved_ids.join(","));
    println!("  {} = {}", "system_actor".cyan(), config.system_actor);
    Ok(())
}

/// Get a single configuration value
pub fn run_get(global: &GlobalArgs, key: &str) -> Result<()> {
    let config = settings::load(&global.data_dir)?;
    println!("{}", settings::get(&config, key)?);
    Ok(())
}

/// Set a configuration value
pub fn run_set(global: &GlobalArgs, key: &str, value: &str) -> Result<()> {
    let mut config = settings::load(&global.data_dir)?;
    settings::set(&mut config, key, value)?;

    // Validate before saving
    config
        .validate()
        .context("Invalid configuration value")?;
    settings::save(&global.data_dir, &config)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    if key == "root_id" {
        println!(
            "{}",
            "Note: an existing tree keeps its old root; run `canopy init` to create the new one"
                .yellow()
        );
    }
    Ok(())
}

/// Show the config file path
pub fn run_path(global: &GlobalArgs) -> Result<()> {
    let config_path = settings::config_file_path(&global.data_dir);
    println!("{}", config_path.display());
    if !config_path.exists() {
        println!("{}", "File does not exist. Run `canopy init` to create it.".yellow());
    }
    Ok(())
}
