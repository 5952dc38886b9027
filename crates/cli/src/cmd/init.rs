//! Initialize a data directory

use crate::session::{is_initialized, GlobalArgs, Session};
use crate::settings;
use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde_json::json;

pub fn run(global: &GlobalArgs) -> Result<()> {
    let existed = is_initialized(&global.data_dir);

    // 1. Directory, config file and database
    let session = Session::create(global)?;

    // 2. Root branch and its self row (idempotent)
    let root = session
        .engine
        .ensure_root()
        .context("Failed to create root branch")?;

    if session.json {
        util::print_json(&json!({
            "data_dir": global.data_dir,
            "created": !existed,
            "root": root,
        }))?;
    } else if existed {
        println!(
            "{} Already initialized at {}",
            "✓".green(),
            global.data_dir.display()
        );
    } else {
        println!(
            "{} Initialized canopy at {}",
            "✓".green(),
            global.data_dir.display().to_string().cyan()
        );
        println!("  {} root branch: {}", "→".dimmed(), root.id.as_str().yellow());
        println!(
            "  {} config: {}",
            "→".dimmed(),
            settings::config_file_path(&global.data_dir).display()
        );
    }

    session.finish()
}
