//! Order intake and the saga event log.
//!
//! The order service is both the saga's initiator (accept an order, publish
//! the start event) and its finalizer (record the terminal envelope from the
//! notification topic). Every envelope it touches is upserted into the saga
//! log keyed by event id, which makes the log the queryable source of truth
//! for "where is this order's saga right now".

pub mod error;
pub mod model;
pub mod postgres;
pub mod service;
pub mod store;

pub use error::{OrderError, Result};
pub use model::Order;
pub use postgres::{PostgresOrderStore, PostgresSagaLog};
pub use service::OrderService;
pub use store::{InMemoryOrderStore, InMemorySagaLog, LoggedEvent, OrderStore, SagaLog};
