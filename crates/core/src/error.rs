//! Error types for command log operations.

use crate::types::WorkflowId;

/// Result type for command log operations.
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors raised while creating or (un)applying commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The target step or tab is gone or belongs to another workflow.
    /// Usually a race with a concurrent edit; callers treat it as a no-op.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A log invariant is broken. The operation is aborted and never retried.
    #[error("Corrupt command log: {0}")]
    CorruptLog(String),

    /// No such workflow.
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    /// Persisting or loading failed.
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CommandError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptLog(message.into())
    }
}
