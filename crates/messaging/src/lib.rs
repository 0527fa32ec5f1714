//! Event envelope data model and topic transport for the order saga.
//!
//! The envelope is the unit of work on every topic: the order payload, the
//! saga status/source tags, and the append-only history trail. The transport
//! is a small publish/subscribe seam with an in-memory broker for tests and
//! single-process deployments.

pub mod envelope;
pub mod error;
pub mod memory;
pub mod payload;
pub mod topic;
pub mod transport;

pub use envelope::{EventSource, HistoryEntry, SagaEnvelope, SagaStatus};
pub use error::{MessagingError, Result};
pub use memory::InMemoryBroker;
pub use payload::{OrderItem, OrderPayload, Product};
pub use topic::Topic;
pub use transport::{MessageBus, Subscription};
