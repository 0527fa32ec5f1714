//! Error types for stage execution.

use thiserror::Error;

use common::{OrderId, TransactionId};
use messaging::MessagingError;

/// Errors raised while running a stage.
///
/// Business-level variants never escape the stage engine: the engine folds
/// them into the outgoing envelope as a rollback request or a failed
/// compensation entry. Only `Transport` surfaces to the caller.
#[derive(Debug, Error)]
pub enum StageError {
    /// The idempotency guard found an existing ledger record for this
    /// attempt.
    #[error("duplicate transaction {transaction_id} for order {order_id}")]
    DuplicateTransaction {
        order_id: OrderId,
        transaction_id: TransactionId,
    },

    /// A stage precondition was violated.
    #[error("{0}")]
    Validation(String),

    /// The stage's backing store failed.
    #[error("ledger store error: {0}")]
    Ledger(String),

    /// Publishing the outcome envelope failed.
    #[error(transparent)]
    Transport(#[from] MessagingError),
}

/// Convenience result type for stage operations.
pub type Result<T> = std::result::Result<T, StageError>;
