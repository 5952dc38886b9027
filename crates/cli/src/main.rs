//! Canopy CLI - canopy command

use anyhow::Result;
use canopy_core::{Decision, TreeError};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::process::ExitCode;
use tracing::Level;

mod cmd;
mod session;
mod settings;
mod util;

use session::{GlobalArgs, Session};

/// Canopy - branch hierarchy with moderated relocation
#[derive(Parser)]
#[command(name = "canopy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, config file and root branch
    Init,
    /// View or edit config.toml
    #[command(subcommand)]
    Config(ConfigCommands),
    #[command(flatten)]
    Tree(TreeCommands),
}

/// Commands that run against an initialized data directory
#[derive(Subcommand)]
enum TreeCommands {
    /// Create a branch under the root, optionally requesting a parent
    Create {
        /// Branch id (lowercase letters, digits, '-' and '_')
        id: String,
        /// Display name
        name: String,
        /// Request a move under this branch once created
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        rules: Option<String>,
    },
    /// Show one branch
    Show { id: String },
    /// List every ancestor of a branch (itself included)
    Ancestors { id: String },
    /// List the subtree rooted at a branch (itself included)
    Descendants { id: String },
    /// List direct children
    Children { id: String },
    /// Ask to move CHILD under PARENT
    Propose { parent: String, child: String },
    /// Accept or reject a pending request
    Decide {
        parent: String,
        child: String,
        /// accept | reject
        decision: Decision,
    },
    /// Pending requests for a parent (or, with --child, for a child)
    Requests {
        id: String,
        /// Treat ID as the child instead of the parent
        #[arg(long)]
        child: bool,
    },
    /// Move a branch directly under the root
    Detach { id: String },
    /// Delete a root-level branch, reassigning its children to the root
    Delete { id: String },
    /// Audit the closure table against parent pointers
    Verify,
    /// Rewrite closure rows from parent pointers
    Repair {
        /// Subtree to repair
        #[arg(required_unless_present = "all")]
        id: Option<String>,
        /// Repair the whole tree and drop rows for missing branches
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
    /// Show the moderation log
    Log {
        /// Only entries for this branch
        #[arg(long)]
        branch: Option<String>,
        /// Number of entries to show (default: 20)
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Manage branch moderators
    #[command(subcommand)]
    Mod(ModCommands),
    /// Show a user's notifications
    Notifications {
        user: String,
        /// Remove the notifications after printing them
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum ModCommands {
    /// Add a moderator
    Add { branch: String, user: String },
    /// Remove a moderator
    Remove { branch: String, user: String },
    /// List moderators
    List { branch: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print one value
    Get { key: String },
    /// Set one value
    Set { key: String, value: String },
    /// Print every value
    List,
    /// Print the config file path
    Path,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.global.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Distinct exit status per error kind so scripts can branch on it
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<TreeError>() {
        Some(TreeError::NotFound(_)) => 2,
        Some(TreeError::Conflict(_)) => 3,
        Some(TreeError::Forbidden(_)) => 4,
        Some(TreeError::BackendUnavailable(_)) => 5,
        Some(TreeError::Invalid(_)) => 6,
        Some(TreeError::Corrupt(_)) => 7,
        None => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    let global = cli.global;

    match cli.command {
        Commands::Init => cmd::init::run(&global),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Get { key } => cmd::config::run_get(&global, &key),
            ConfigCommands::Set { key, value } => cmd::config::run_set(&global, &key, &value),
            ConfigCommands::List => cmd::config::run_list(&global),
            ConfigCommands::Path => cmd::config::run_path(&global),
        },
        Commands::Tree(command) => {
            let session = Session::open(&global)?;
            // Events published before a failure are still delivered
            let result = run_tree(&session, command);
            session.finish()?;
            result
        }
    }
}

fn run_tree(session: &Session, command: TreeCommands) -> Result<()> {
    match command {
        TreeCommands::Create {
            id,
            name,
            parent,
            description,
            rules,
        } => cmd::create::run(session, id, name, parent, description, rules),
        TreeCommands::Show { id } => cmd::show::run(session, &id),
        TreeCommands::Ancestors { id } => cmd::show::run_ancestors(session, &id),
        TreeCommands::Descendants { id } => cmd::show::run_descendants(session, &id),
        TreeCommands::Children { id } => cmd::show::run_children(session, &id),
        TreeCommands::Propose { parent, child } => {
            cmd::request::run_propose(session, &parent, &child)
        }
        TreeCommands::Decide {
            parent,
            child,
            decision,
        } => cmd::request::run_decide(session, &parent, &child, decision),
        TreeCommands::Requests { id, child } => cmd::request::run_list(session, &id, child),
        TreeCommands::Detach { id } => cmd::remove::run_detach(session, &id),
        TreeCommands::Delete { id } => cmd::remove::run_delete(session, &id),
        TreeCommands::Verify => cmd::verify::run(session),
        TreeCommands::Repair { id, all } => cmd::verify::run_repair(session, id.as_deref(), all),
        TreeCommands::Log { branch, limit } => cmd::log::run(session, branch.as_deref(), limit),
        TreeCommands::Mod(mod_cmd) => match mod_cmd {
            ModCommands::Add { branch, user } => cmd::moderators::run_add(session, &branch, &user),
            ModCommands::Remove { branch, user } => {
                cmd::moderators::run_remove(session, &branch, &user)
            }
            ModCommands::List { branch } => cmd::moderators::run_list(session, &branch),
        },
        TreeCommands::Notifications { user, clear } => {
            cmd::notifications::run(session, &user, clear)
        }
    }
}
