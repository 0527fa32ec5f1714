//! Error types for order intake and the saga event log.

use thiserror::Error;

use messaging::MessagingError;

/// Errors raised by the order service and its stores.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Request data failed validation.
    #[error("{0}")]
    Validation(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Publishing the saga start event failed.
    #[error(transparent)]
    Transport(#[from] MessagingError),
}

/// Result type for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;
