//! Branch-tree consistency engine
//!
//! This crate provides:
//! - Ancestor index primitives (minimal row-level retagging plans)
//! - Subtree relocation with cycle and no-op checks
//! - The propose / accept / reject relocation workflow
//! - Detach and delete with child reassignment
//! - Verification and repair of the closure table
//! - An event outbox feeding the mod log and notifications

pub mod detach;
pub mod engine;
pub mod events;
pub mod index;
pub mod relocate;
pub mod verify;
pub mod workflow;

// Re-exports
pub use detach::DeleteReport;
pub use engine::{CreateOutcome, TreeEngine};
pub use events::{EventDispatcher, Outbox, TreeEvent};
pub use index::{AncestorIndex, TagPlan, TagPlanStats};
pub use relocate::RelocationReport;
pub use verify::{RepairReport, VerifyReport, Violation};
pub use workflow::{DecisionOutcome, ProposalOutcome};

/// Result type for engine operations
pub type Result<T> = canopy_core::Result<T>;
