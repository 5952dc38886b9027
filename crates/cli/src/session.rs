//! Per-invocation state: data directory, store, engine and event delivery

use crate::settings;
use anyhow::{Context, Result};
use canopy_core::BranchId;
use canopy_engine::{EventDispatcher, Outbox, TreeEngine};
use canopy_store::db::DB_FILE;
use canopy_store::SledStore;
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Flags shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Data directory holding the database and config.toml
    #[arg(long, global = true, default_value = ".canopy")]
    pub data_dir: PathBuf,

    /// User recorded as the actor (default: $USER, then "system")
    #[arg(long, global = true)]
    pub actor: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose logging (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalArgs {
    pub fn actor(&self) -> String {
        self.actor
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "system".to_string())
    }
}

/// An opened data directory
pub struct Session {
    pub actor: String,
    pub json: bool,
    pub db: SledStore,
    pub engine: TreeEngine,
    dispatcher: EventDispatcher,
}

impl Session {
    /// Open an initialized data directory
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        if !is_initialized(&global.data_dir) {
            anyhow::bail!(
                "Not a canopy data directory: {} (run `canopy init` first)",
                global.data_dir.display()
            );
        }
        Self::open_at(global)
    }

    /// Open, creating the directory and database if needed
    pub fn create(global: &GlobalArgs) -> Result<Self> {
        std::fs::create_dir_all(&global.data_dir)
            .with_context(|| format!("Failed to create {}", global.data_dir.display()))?;
        settings::init_if_missing(&global.data_dir)?;
        Self::open_at(global)
    }

    fn open_at(global: &GlobalArgs) -> Result<Self> {
        let config = settings::load(&global.data_dir)?;
        let db = SledStore::open(&global.data_dir).context("Failed to open branch store")?;

        let (outbox, rx) = Outbox::channel();
        let dispatcher = EventDispatcher::new(
            rx,
            db.modlog(),
            db.notifications(),
            db.roster(),
            BranchId::from(config.root_id.as_str()),
        );
        let engine = TreeEngine::new(db.stores(), config, outbox)
            .context("Invalid tree configuration")?;

        Ok(Self {
            actor: global.actor(),
            json: global.json,
            db,
            engine,
            dispatcher,
        })
    }

    /// Deliver queued events and flush the database
    pub fn finish(self) -> Result<()> {
        let delivered = self.dispatcher.dispatch_pending();
        debug!("delivered {} event(s)", delivered);
        self.db.flush().context("Failed to flush branch store")?;
        Ok(())
    }
}

pub fn is_initialized(data_dir: &Path) -> bool {
    data_dir.join(DB_FILE).exists()
}
