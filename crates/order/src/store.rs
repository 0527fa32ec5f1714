//! Persistence seams for orders and the saga event log.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{EventId, OrderId, TransactionId};
use messaging::SagaEnvelope;

use crate::error::Result;
use crate::model::Order;

/// A saga envelope as recorded in the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedEvent {
    #[serde(flatten)]
    pub envelope: SagaEnvelope,
    /// Server-side timestamp, refreshed whenever the row is replaced.
    pub created_at: DateTime<Utc>,
}

/// Storage for accepted orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order.
    async fn save(&self, order: &Order) -> Result<()>;

    /// Fetches an order by id.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>>;
}

/// Log of every saga envelope the order service touches.
///
/// Rows are keyed by envelope id: saving the same event twice replaces the
/// earlier row, so the log converges to the latest view of each envelope.
#[async_trait]
pub trait SagaLog: Send + Sync {
    /// Upserts an envelope by its event id.
    async fn save(&self, envelope: &SagaEnvelope) -> Result<()>;

    /// All logged events, latest first.
    async fn find_all(&self) -> Result<Vec<LoggedEvent>>;

    /// Latest event for an order.
    async fn find_latest_by_order_id(&self, order_id: OrderId) -> Result<Option<LoggedEvent>>;

    /// Latest event for a transaction.
    async fn find_latest_by_transaction_id(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<LoggedEvent>>;
}

/// In-memory order store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub fn order_count(&self) -> usize {
        self.orders.read().unwrap().len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: &Order) -> Result<()> {
        self.orders.write().unwrap().insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().unwrap().get(&id).cloned())
    }
}

#[derive(Default)]
struct InMemorySagaLogState {
    rows: HashMap<EventId, (u64, LoggedEvent)>,
    next_seq: u64,
}

/// In-memory saga event log.
///
/// A sequence number stands in for the database's insertion clock so that
/// "latest first" stays deterministic even for writes within the same
/// millisecond.
#[derive(Clone, Default)]
pub struct InMemorySagaLog {
    state: Arc<RwLock<InMemorySagaLogState>>,
}

impl InMemorySagaLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of logged events.
    pub fn event_count(&self) -> usize {
        self.state.read().unwrap().rows.len()
    }
}

#[async_trait]
impl SagaLog for InMemorySagaLog {
    async fn save(&self, envelope: &SagaEnvelope) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.rows.insert(
            envelope.id,
            (
                seq,
                LoggedEvent {
                    envelope: envelope.clone(),
                    created_at: Utc::now(),
                },
            ),
        );
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<LoggedEvent>> {
        let state = self.state.read().unwrap();
        let mut rows: Vec<_> = state.rows.values().cloned().collect();
        rows.sort_by(|(a, _), (b, _)| b.cmp(a));
        Ok(rows.into_iter().map(|(_, event)| event).collect())
    }

    async fn find_latest_by_order_id(&self, order_id: OrderId) -> Result<Option<LoggedEvent>> {
        let state = self.state.read().unwrap();
        Ok(state
            .rows
            .values()
            .filter(|(_, event)| event.envelope.order_id == order_id)
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, event)| event.clone()))
    }

    async fn find_latest_by_transaction_id(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<LoggedEvent>> {
        let state = self.state.read().unwrap();
        Ok(state
            .rows
            .values()
            .filter(|(_, event)| event.envelope.transaction_id == *transaction_id)
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, event)| event.clone()))
    }
}
