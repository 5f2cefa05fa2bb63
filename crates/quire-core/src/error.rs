//! Error types for quire.

use thiserror::Error;

/// Result type alias using quire's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for quire operations.
///
/// The first five variants form the closed access-control taxonomy. Their
/// messages are shown to end users as-is, so each one names the rule that
/// was violated.
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced note or grant target does not exist
    #[error("{0}")]
    NotFound(String),

    /// Caller lacks the permission tier required for the operation
    #[error("{0}")]
    NotAuthorized(String),

    /// A grant already exists for the (note, user) pair
    #[error("{0}")]
    AlreadyShared(String),

    /// No grant exists for the (note, user) pair
    #[error("{0}")]
    NotShared(String),

    /// Permission literal outside {read, write}
    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fieldless discriminant of [`Error`].
///
/// Callers branch on this instead of inspecting message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NotAuthorized,
    AlreadyShared,
    NotShared,
    InvalidPermission,
    InvalidInput,
    Database,
    Config,
    Internal,
}

impl Error {
    /// Discriminant of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::NotAuthorized(_) => ErrorKind::NotAuthorized,
            Error::AlreadyShared(_) => ErrorKind::AlreadyShared,
            Error::NotShared(_) => ErrorKind::NotShared,
            Error::InvalidPermission(_) => ErrorKind::InvalidPermission,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Database(_) => ErrorKind::Database,
            Error::Config(_) => ErrorKind::Config,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status class the calling layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::NotAuthorized => 401,
            ErrorKind::AlreadyShared
            | ErrorKind::NotShared
            | ErrorKind::InvalidPermission
            | ErrorKind::InvalidInput => 400,
            ErrorKind::Database | ErrorKind::Config | ErrorKind::Internal => 500,
        }
    }

    /// Whether the failure was caused by caller state or input.
    ///
    /// Client errors are never retried.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    pub(crate) fn note_not_found() -> Self {
        Error::NotFound("Note not found".to_string())
    }
}
