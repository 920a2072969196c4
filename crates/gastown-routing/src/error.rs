//! Routing error types.

/// Errors that can occur during routing and redirect operations.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A route source (daemon, CLI) could not be reached.
    #[error("route source unavailable: {0}")]
    Unavailable(String),

    /// Refused to write a redirect into a canonical store location.
    #[error("refusing to write redirect into canonical store at {path}")]
    CanonicalStore {
        /// The canonical location that was targeted.
        path: String,
    },

    /// The store is owned by a daemon; direct filesystem mutation refused.
    #[error("store is daemon-owned; filesystem mutation refused")]
    DaemonOwned,

    /// A town configuration file failed to parse.
    #[error("failed to parse {file}: {reason}")]
    Parse {
        /// The file that failed to parse.
        file: String,
        /// Underlying parser message.
        reason: String,
    },

    /// The town root could not be located.
    #[error("no town root found (set GT_TOWN_ROOT or run inside a town)")]
    TownNotFound,
}

/// Convenience alias used throughout the routing crate.
pub type Result<T> = std::result::Result<T, RoutingError>;

impl RoutingError {
    /// Creates a [`RoutingError::Parse`] for the given file.
    pub fn parse(file: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            file: file.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if this is a [`RoutingError::Unavailable`].
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
