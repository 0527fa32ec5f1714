use thiserror::Error;

use crate::Topic;

/// Errors that can occur in the topic transport.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The transport could not deliver an envelope to a topic.
    #[error("Failed to publish to topic {topic}: {reason}")]
    Publish { topic: Topic, reason: String },

    /// A wire encoding or decoding error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
