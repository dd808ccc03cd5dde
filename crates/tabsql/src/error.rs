//! Error types for the engine.

use thiserror::Error;

/// Engine errors.
///
/// Failures the engine reports while executing a statement (constraint
/// violations, type errors and the like) surface as [`TabsqlError::Database`]
/// and are never retried.
#[derive(Debug, Error)]
pub enum TabsqlError {
    /// Sanitizing, parsing, inference or synthesis failed.
    #[error(transparent)]
    Core(#[from] tabsql_core::Error),

    /// Database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid configuration document.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// IO error (reading configuration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TabsqlError {
    /// The core error, if this is one.
    #[must_use]
    pub const fn as_core(&self) -> Option<&tabsql_core::Error> {
        match self {
            Self::Core(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, TabsqlError>;
