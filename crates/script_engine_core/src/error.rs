//! crates/script_engine_core/src/error.rs
//!
//! Errors surfaced by the editing session.

use std::fmt;

use crate::domain::{BlockId, BlockKind};
use crate::patch::PatchError;
use crate::ports::PortError;
use crate::session::BlockOperation;
use crate::validation::ValidationReport;

/// Why an operation could not start right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusyReason {
    Generation,
    Block { id: BlockId, operation: BlockOperation },
}

/// The primary error type of the editing session.
///
/// No variant is fatal: every failed operation leaves the session as it was.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A gateway-sourced document or block failed validation and was not committed.
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    #[error("Block not found: {0}")]
    NotFound(BlockId),

    /// The external service failed (network, quota or malformed response).
    #[error("Service error: {0}")]
    Service(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Source text is empty")]
    EmptySource,

    #[error("Document has no blocks")]
    EmptyDocument,

    #[error("Block {0} has no content to narrate")]
    EmptyContent(BlockId),

    #[error("{0}")]
    Busy(BusyReason),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("Block {id} is a {kind} block and has no visual prompt")]
    MissingVisualPrompt { id: BlockId, kind: BlockKind },

    #[error("No audit report is available; audit the document first")]
    NoAuditReport,

    /// The document was replaced wholesale while the operation was pending.
    #[error("Document was replaced while the operation was pending")]
    DocumentReplaced,
}

impl fmt::Display for BusyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusyReason::Generation => f.write_str("A script generation is already in progress"),
            BusyReason::Block { id, operation } => {
                write!(f, "Block {id} already has a {operation} operation in progress")
            }
        }
    }
}

impl From<PortError> for SessionError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::Cancelled => SessionError::Cancelled,
            other => SessionError::Service(other.to_string()),
        }
    }
}

/// A convenience type alias for `Result<T, SessionError>`.
pub type SessionResult<T> = Result<T, SessionError>;
