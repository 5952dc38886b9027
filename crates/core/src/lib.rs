//! Canopy Core - data model and interfaces for the branch tree
//!
//! This crate provides:
//! - Branch records and validated ids
//! - Closure-table rows, relocation requests, mod log and notification records
//! - The error taxonomy shared by every layer
//! - Store and collaborator traits, with in-memory implementations
//! - Tree configuration

pub mod branch;
pub mod config;
pub mod error;
pub mod memory;
pub mod records;
pub mod store;

// Re-export main types for convenience
pub use branch::{now_ms, Branch, BranchId, BranchPatch, BranchState, NewBranch, Username};
pub use config::TreeConfig;
pub use error::{Result, TreeError};
pub use records::{
    AncestorTag, Decision, ModAction, ModLogEntry, Notification, NotificationKind,
    RelocationRequest,
};
pub use store::{AuditSink, BranchStore, ModeratorRoster, Notifier, RequestStore, Stores, TagStore};
