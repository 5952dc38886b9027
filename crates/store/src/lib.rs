//! Persistent branch-tree storage on sled
//!
//! This crate provides:
//! - Branch records with a parent -> children index
//! - The ancestor closure table, indexed by branch and by ancestor
//! - Pending relocation requests, indexed by parent and by child
//! - Append-only moderation log, moderator roster and notification inbox
//!
//! Every write is a single-key operation. Nothing spans records atomically;
//! callers recover from interrupted multi-row changes by re-running them.

pub mod branches;
pub mod db;
pub mod modlog;
pub mod notifications;
pub mod requests;
pub mod roster;
pub mod tags;

// Re-exports
pub use branches::SledBranchStore;
pub use db::SledStore;
pub use modlog::ModLog;
pub use notifications::NotificationQueue;
pub use requests::SledRequestStore;
pub use roster::Roster;
pub use tags::SledTagStore;
