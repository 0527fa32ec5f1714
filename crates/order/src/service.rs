//! Order intake and saga event queries.

use common::{OrderId, TransactionId};
use messaging::{MessageBus, OrderItem, SagaEnvelope, Topic};

use crate::error::{OrderError, Result};
use crate::model::Order;
use crate::store::{LoggedEvent, OrderStore, SagaLog};

/// Front door of the saga.
///
/// Accepts orders and publishes their start events, records terminal
/// notifications, and answers audit queries over the saga log.
pub struct OrderService<M, O, L> {
    bus: M,
    orders: O,
    saga_log: L,
}

impl<M, O, L> OrderService<M, O, L>
where
    M: MessageBus,
    O: OrderStore,
    L: SagaLog,
{
    pub fn new(bus: M, orders: O, saga_log: L) -> Self {
        Self {
            bus,
            orders,
            saga_log,
        }
    }

    /// Accepts an order and starts its saga.
    ///
    /// The returned envelope is the exact event published to the start
    /// topic, so callers can hand its identifiers back to the client.
    #[tracing::instrument(skip(self, products), fields(product_count = products.len()))]
    pub async fn create_order(&self, products: Vec<OrderItem>) -> Result<SagaEnvelope> {
        if products.is_empty() {
            return Err(OrderError::Validation(
                "Products list is empty!".to_string(),
            ));
        }

        let order = Order::new(products);
        self.orders.save(&order).await?;

        let envelope =
            SagaEnvelope::new(order.id, order.transaction_id.clone(), order.to_payload());
        self.saga_log.save(&envelope).await?;

        tracing::info!(
            order_id = %order.id,
            transaction_id = %order.transaction_id,
            "order accepted"
        );
        metrics::counter!("orders_created_total").increment(1);

        self.bus.publish(Topic::StartSaga, &envelope).await?;
        Ok(envelope)
    }

    /// Records a terminal notification.
    ///
    /// The envelope keeps its id through the whole saga, so this replaces
    /// the pending row written at intake and the log converges to the
    /// terminal state.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            order_id = %envelope.order_id,
            transaction_id = %envelope.transaction_id,
            event_id = %envelope.id,
        )
    )]
    pub async fn record_ending(&self, envelope: &SagaEnvelope) -> Result<()> {
        self.saga_log.save(envelope).await?;
        tracing::info!(status = ?envelope.status, "saga ending recorded");
        Ok(())
    }

    /// All logged saga events, latest first.
    pub async fn find_all_events(&self) -> Result<Vec<LoggedEvent>> {
        self.saga_log.find_all().await
    }

    /// Latest event matching either filter; at least one must be given.
    pub async fn find_event_by_filters(
        &self,
        order_id: Option<OrderId>,
        transaction_id: Option<TransactionId>,
    ) -> Result<Option<LoggedEvent>> {
        match (order_id, transaction_id) {
            (Some(order_id), _) => self.saga_log.find_latest_by_order_id(order_id).await,
            (None, Some(transaction_id)) => {
                self.saga_log
                    .find_latest_by_transaction_id(&transaction_id)
                    .await
            }
            (None, None) => Err(OrderError::Validation(
                "OrderID or TransactionID must be informed".to_string(),
            )),
        }
    }

    /// Fetches an accepted order.
    pub async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        self.orders.find_by_id(id).await
    }
}
