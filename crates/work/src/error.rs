//! Errors returned to callers of the work service.

use bookwork_core::{TaskId, TransitionError};
use bookwork_progress::CascadeError;
use bookwork_storage::StorageError;

/// Result alias for work operations.
pub type Result<T> = std::result::Result<T, WorkError>;

/// Errors that cross the service boundary.
///
/// Remote recompute and notification failures never appear here: the cascade
/// absorbs them.
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    /// Requested status change is not in the transition table
    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    /// Referenced record does not exist
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind
        kind: &'static str,
        /// Record id
        id: String,
    },

    /// A field in the request was rejected
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Field name as it appears in the request
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Task is locked against descriptive edits
    #[error("task {0} is not editable")]
    NotEditable(TaskId),

    /// The record changed since it was read
    #[error("{kind} {id} was modified concurrently, reload and retry")]
    Conflict {
        /// Record kind
        kind: &'static str,
        /// Record id
        id: String,
    },

    /// Persistence failure
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl WorkError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Storage(_))
    }
}

impl From<StorageError> for WorkError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, id } => Self::NotFound { kind, id },
            StorageError::Conflict { kind, id, .. } => Self::Conflict { kind, id },
            other => Self::Storage(other),
        }
    }
}

impl From<CascadeError> for WorkError {
    fn from(err: CascadeError) -> Self {
        match err {
            CascadeError::NotFound { kind, id } => Self::NotFound { kind, id },
            CascadeError::Storage(e) => e.into(),
        }
    }
}
