//! The order as accepted at the edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{OrderId, TransactionId};
use messaging::{OrderItem, OrderPayload};

/// A customer order, created when the HTTP request is accepted.
///
/// The transaction id is minted here; every saga message for this order
/// carries it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub products: Vec<OrderItem>,
    pub transaction_id: TransactionId,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates an order with a fresh identity and transaction id.
    pub fn new(products: Vec<OrderItem>) -> Self {
        Self {
            id: OrderId::new(),
            products,
            transaction_id: TransactionId::new(),
            created_at: Utc::now(),
        }
    }

    /// Payload snapshot carried through the saga.
    pub fn to_payload(&self) -> OrderPayload {
        OrderPayload::new(self.id, self.products.clone())
    }
}
