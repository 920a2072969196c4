//! Store operation error types.

use gastown_routing::RoutingError;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    /// The requested bead / convoy / formula was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g., "bead", "convoy", "formula").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The caller supplied an argument the operation cannot act on.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },

    /// The foreign store is unreachable (binary missing, daemon down).
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Why the store is considered unreachable.
        reason: String,
    },

    /// A structural conflict (duplicate tracker, prefix clash).
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// A write appeared to succeed but the read-after did not reflect it.
    #[error("verification failed: {message}")]
    Verification {
        /// What the re-fetch observed.
        message: String,
    },

    /// An aggregate where some sub-operations succeeded.
    #[error("{succeeded} succeeded, {} failed: {}", errors.len(), errors.join("; "))]
    Partial {
        /// Number of sub-operations that succeeded.
        succeeded: usize,
        /// Per-item error descriptions.
        errors: Vec<String>,
    },

    /// The foreign CLI exited non-zero or produced unusable output.
    #[error("store error: {message}")]
    Store {
        /// The CLI's complaint.
        message: String,
    },

    /// A routing failure bubbling up from the route table or redirects.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// JSON from the store failed to parse.
    #[error("malformed store output: {0}")]
    Json(#[from] serde_json::Error),

    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the ops crate.
pub type Result<T> = std::result::Result<T, OpsError>;

impl OpsError {
    // -- Constructors --------------------------------------------------------

    /// Creates an [`OpsError::NotFound`] for the given entity kind and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an [`OpsError::InvalidArgument`] with the given message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an [`OpsError::Unavailable`] with the given reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates an [`OpsError::Conflict`] with the given message.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an [`OpsError::Verification`] with the given message.
    pub fn verification(message: impl Into<String>) -> Self {
        Self::Verification {
            message: message.into(),
        }
    }

    /// Creates an [`OpsError::Store`] with the given message.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    // -- Predicates ----------------------------------------------------------

    /// Returns `true` if this is an [`OpsError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Verification { .. })
    }
}
