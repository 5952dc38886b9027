//! Error taxonomy for branch-tree operations.

use thiserror::Error;

/// Result type alias for branch-tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors surfaced by the stores and the tree engine.
///
/// `NotFound`, `Conflict`, `Forbidden` and `Invalid` are terminal: retrying
/// the same call cannot change the outcome. `BackendUnavailable` is the only
/// kind a caller should retry, and the whole top-level operation should be
/// re-run rather than resumed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// A branch, request or ancestor row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate proposal, already-satisfied relocation, or a cycle
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation not permitted on this branch
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The backing store failed
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Malformed input (branch id syntax, configuration values)
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// A stored record could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl TreeError {
    /// Creates a new not-found error.
    pub fn not_found<T: ToString>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Creates a new conflict error.
    pub fn conflict<T: ToString>(msg: T) -> Self {
        Self::Conflict(msg.to_string())
    }

    /// Creates a new forbidden error.
    pub fn forbidden<T: ToString>(msg: T) -> Self {
        Self::Forbidden(msg.to_string())
    }

    /// Creates a new backend error.
    pub fn backend<T: ToString>(msg: T) -> Self {
        Self::BackendUnavailable(msg.to_string())
    }

    /// Creates a new invalid input error.
    pub fn invalid<T: ToString>(msg: T) -> Self {
        Self::Invalid(msg.to_string())
    }

    /// Creates a new corrupt record error.
    pub fn corrupt<T: ToString>(msg: T) -> Self {
        Self::Corrupt(msg.to_string())
    }

    /// Whether re-running the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }

    /// Short, stable name of the error kind (used in CLI/JSON output).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Forbidden(_) => "forbidden",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Invalid(_) => "invalid",
            Self::Corrupt(_) => "corrupt",
        }
    }
}
