//! Error types for saga orchestration.

use thiserror::Error;

use common::EventId;
use messaging::{EventSource, MessagingError, SagaStatus};

/// Errors raised while routing saga envelopes.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// An envelope reached the orchestrator without routing metadata.
    #[error("event {event_id} cannot be routed: source and status must be informed")]
    MissingRoutingMetadata { event_id: EventId },

    /// The transition table has no row for this decision.
    #[error("no transition for source {source} with status {status}")]
    UnroutableDecision {
        // `r#` keeps thiserror from treating this data field as the error's
        // cause chain, which would require `EventSource: std::error::Error`.
        r#source: EventSource,
        status: SagaStatus,
    },

    /// The derived table failed its startup totality check.
    #[error("transition table is missing a row for source {source} with status {status}")]
    IncompleteTable {
        // Same as above: not a `std::error::Error` cause.
        r#source: EventSource,
        status: SagaStatus,
    },

    /// Publishing the routed envelope failed.
    #[error(transparent)]
    Transport(#[from] MessagingError),
}

/// Convenience result type for orchestration operations.
pub type Result<T> = std::result::Result<T, OrchestrationError>;
