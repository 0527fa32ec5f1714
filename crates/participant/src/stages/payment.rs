//! Payment stage: computes order totals and charges the payment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use messaging::{EventSource, SagaEnvelope};

use crate::engine::{StageBehavior, StageMessages};
use crate::error::{Result, StageError};
use crate::ledger::{LedgerKey, LedgerStore};

/// Smallest total a payment may charge.
pub const MIN_AMOUNT: f64 = 0.1;

/// Lifecycle of one payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Success,
    Refund,
}

/// Ledger record for one payment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub total_amount: f64,
    pub total_items: u32,
    pub status: PaymentStatus,
}

/// Second pipeline stage: charge the computed order total.
pub struct PaymentStage<L> {
    ledger: L,
}

impl<L> PaymentStage<L>
where
    L: LedgerStore<PaymentRecord>,
{
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Read access to the stage ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    fn totals(envelope: &SagaEnvelope) -> (f64, u32) {
        let products = &envelope.payload.products;
        let amount = products
            .iter()
            .map(|item| item.product.unit_value * f64::from(item.quantity))
            .sum();
        let items = products.iter().map(|item| item.quantity).sum();
        (amount, items)
    }
}

#[async_trait]
impl<L> StageBehavior for PaymentStage<L>
where
    L: LedgerStore<PaymentRecord>,
{
    fn source(&self) -> EventSource {
        EventSource::PaymentService
    }

    fn messages(&self) -> StageMessages {
        StageMessages {
            success: "Payment realized successfully!",
            failure_prefix: "Fail to realize payment",
            compensated: "Rollback executed for payment!",
            compensation_failed_prefix: "Rollback not executed for payment",
        }
    }

    async fn already_processed(&self, key: &LedgerKey) -> Result<bool> {
        self.ledger.exists(key).await
    }

    async fn precheck(&self, _envelope: &SagaEnvelope) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, envelope: &mut SagaEnvelope) -> Result<()> {
        let key = LedgerKey::from_envelope(envelope);
        let (total_amount, total_items) = Self::totals(envelope);

        envelope.payload.total_amount = Some(total_amount);
        envelope.payload.total_items = Some(total_items);

        // The pending row commits before the amount check so a rejected
        // charge still leaves a refundable trace.
        self.ledger
            .insert_new(
                key.clone(),
                PaymentRecord {
                    total_amount,
                    total_items,
                    status: PaymentStatus::Pending,
                },
            )
            .await?;

        if total_amount < MIN_AMOUNT {
            return Err(StageError::Validation(format!(
                "The minimum amount available is {MIN_AMOUNT}"
            )));
        }

        self.ledger
            .update(
                &key,
                PaymentRecord {
                    total_amount,
                    total_items,
                    status: PaymentStatus::Success,
                },
            )
            .await
    }

    async fn compensate(&self, envelope: &SagaEnvelope) -> Result<()> {
        let key = LedgerKey::from_envelope(envelope);
        let record = match self.ledger.find(&key).await? {
            Some(mut record) => {
                record.status = PaymentStatus::Refund;
                record
            }
            // Forward pass never committed; keep a refunded row for audit.
            None => {
                let (total_amount, total_items) = Self::totals(envelope);
                PaymentRecord {
                    total_amount,
                    total_items,
                    status: PaymentStatus::Refund,
                }
            }
        };
        self.ledger.update(&key, record).await
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, TransactionId};
    use messaging::{OrderItem, OrderPayload, Product};

    use crate::ledger::InMemoryLedger;

    use super::*;

    fn stage() -> PaymentStage<InMemoryLedger<PaymentRecord>> {
        PaymentStage::new(InMemoryLedger::new())
    }

    fn envelope_for(items: &[(f64, u32)]) -> SagaEnvelope {
        let order_id = OrderId::new();
        let products = items
            .iter()
            .map(|(unit_value, quantity)| OrderItem {
                product: Product {
                    code: "COMIC_BOOKS".to_string(),
                    unit_value: *unit_value,
                },
                quantity: *quantity,
            })
            .collect();
        SagaEnvelope::new(
            order_id,
            TransactionId::new(),
            OrderPayload::new(order_id, products),
        )
    }

    #[tokio::test]
    async fn execute_computes_totals_and_charges() {
        let stage = stage();
        let mut envelope = envelope_for(&[(10.0, 2), (5.0, 3)]);

        stage.execute(&mut envelope).await.unwrap();

        assert_eq!(envelope.payload.total_amount, Some(35.0));
        assert_eq!(envelope.payload.total_items, Some(5));

        let key = LedgerKey::from_envelope(&envelope);
        let record = stage.ledger().find(&key).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Success);
        assert_eq!(record.total_amount, 35.0);
        assert_eq!(record.total_items, 5);
    }

    #[tokio::test]
    async fn execute_rejects_total_below_minimum() {
        let stage = stage();
        let mut envelope = envelope_for(&[(0.05, 1)]);

        let err = stage.execute(&mut envelope).await.unwrap_err();

        assert_eq!(err.to_string(), "The minimum amount available is 0.1");
        // Totals are still stamped onto the payload for downstream visibility.
        assert_eq!(envelope.payload.total_amount, Some(0.05));

        let key = LedgerKey::from_envelope(&envelope);
        let record = stage.ledger().find(&key).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn execute_rejects_repeated_attempt() {
        let stage = stage();
        let mut envelope = envelope_for(&[(10.0, 1)]);

        stage.execute(&mut envelope).await.unwrap();
        let err = stage.execute(&mut envelope).await.unwrap_err();

        assert!(matches!(err, StageError::DuplicateTransaction { .. }));
    }

    #[tokio::test]
    async fn compensate_refunds_charged_payment() {
        let stage = stage();
        let mut envelope = envelope_for(&[(10.0, 2)]);
        stage.execute(&mut envelope).await.unwrap();

        stage.compensate(&envelope).await.unwrap();

        let key = LedgerKey::from_envelope(&envelope);
        let record = stage.ledger().find(&key).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Refund);
        assert_eq!(record.total_amount, 20.0);
    }

    #[tokio::test]
    async fn compensate_refunds_pending_payment() {
        let stage = stage();
        let mut envelope = envelope_for(&[(0.05, 1)]);
        let _ = stage.execute(&mut envelope).await;

        stage.compensate(&envelope).await.unwrap();

        let key = LedgerKey::from_envelope(&envelope);
        let record = stage.ledger().find(&key).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Refund);
    }

    #[tokio::test]
    async fn compensate_without_prior_record_stores_refund_marker() {
        let stage = stage();
        let envelope = envelope_for(&[(10.0, 1)]);

        stage.compensate(&envelope).await.unwrap();

        let key = LedgerKey::from_envelope(&envelope);
        let record = stage.ledger().find(&key).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Refund);
        assert_eq!(record.total_amount, 10.0);
    }
}
