use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{EventId, OrderId, TransactionId};

use crate::payload::OrderPayload;

/// Outcome a participant reports for one stage visit.
///
/// `Success` advances the pipeline. `RollbackPending` means "I did not
/// complete; I may hold partial state and have not compensated myself yet".
/// `Fail` means "I have confirmed I am compensated", which unwinds the saga
/// one stage further back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    Success,
    RollbackPending,
    Fail,
}

impl SagaStatus {
    /// Returns the status wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Success => "SUCCESS",
            SagaStatus::RollbackPending => "ROLLBACK_PENDING",
            SagaStatus::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies who most recently wrote the envelope status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    Orchestrator,
    ProductValidationService,
    PaymentService,
    InventoryService,
}

impl EventSource {
    /// Returns the source wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Orchestrator => "ORCHESTRATOR",
            EventSource::ProductValidationService => "PRODUCT_VALIDATION_SERVICE",
            EventSource::PaymentService => "PAYMENT_SERVICE",
            EventSource::InventoryService => "INVENTORY_SERVICE",
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable audit record in the envelope history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub source: EventSource,
    pub status: SagaStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// The unit of work flowing through every saga topic.
///
/// Created once by the initiator and passed by value between workers; each
/// hop may be a different process, so nothing here is shared state. Stages
/// may set `status`/`source`, fill payload totals, and append history; there
/// is no other legal mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaEnvelope {
    /// Unique per envelope instance; assigned at construction, never mutated.
    pub id: EventId,
    /// Identifies the saga attempt; stable until a terminal topic is reached.
    pub transaction_id: TransactionId,
    /// Identifies the business order.
    pub order_id: OrderId,
    /// The order snapshot, mutated additively by stages.
    pub payload: OrderPayload,
    /// Empty only before the first stage has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SagaStatus>,
    /// Who most recently wrote `status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EventSource>,
    /// Append-only audit trail, one entry per stage visit.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl SagaEnvelope {
    /// Creates the initial envelope for a fresh saga attempt.
    ///
    /// `status` and `source` start unset and `history` empty; the first
    /// stage visit fills them in.
    pub fn new(order_id: OrderId, transaction_id: TransactionId, payload: OrderPayload) -> Self {
        Self {
            id: EventId::new(),
            transaction_id,
            order_id,
            payload,
            status: None,
            source: None,
            history: Vec::new(),
        }
    }

    /// Sets routing metadata without touching the audit trail.
    ///
    /// Used by the orchestrator, which stamps fresh and terminal envelopes
    /// but never counts as a stage visit.
    pub fn stamp(&mut self, source: EventSource, status: SagaStatus) {
        self.source = Some(source);
        self.status = Some(status);
    }

    /// Records a successful stage visit.
    pub fn mark_success(&mut self, source: EventSource, message: impl Into<String>) {
        self.record(source, SagaStatus::Success, message);
    }

    /// Records a failed stage visit that still awaits its own compensation.
    pub fn mark_rollback_pending(&mut self, source: EventSource, message: impl Into<String>) {
        self.record(source, SagaStatus::RollbackPending, message);
    }

    /// Records a compensated stage visit.
    pub fn mark_fail(&mut self, source: EventSource, message: impl Into<String>) {
        self.record(source, SagaStatus::Fail, message);
    }

    fn record(&mut self, source: EventSource, status: SagaStatus, message: impl Into<String>) {
        self.stamp(source, status);
        self.history.push(HistoryEntry {
            source,
            status,
            message: message.into(),
            created_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{OrderItem, Product};

    fn sample_envelope() -> SagaEnvelope {
        let order_id = OrderId::new();
        let payload = OrderPayload::new(
            order_id,
            vec![OrderItem {
                product: Product {
                    code: "BOOKS".to_string(),
                    unit_value: 5.0,
                },
                quantity: 1,
            }],
        );
        SagaEnvelope::new(order_id, TransactionId::new(), payload)
    }

    #[test]
    fn fresh_envelope_has_no_routing_metadata() {
        let envelope = sample_envelope();
        assert!(envelope.status.is_none());
        assert!(envelope.source.is_none());
        assert!(envelope.history.is_empty());
    }

    #[test]
    fn mark_success_sets_metadata_and_appends_one_entry() {
        let mut envelope = sample_envelope();
        envelope.mark_success(EventSource::PaymentService, "done");

        assert_eq!(envelope.status, Some(SagaStatus::Success));
        assert_eq!(envelope.source, Some(EventSource::PaymentService));
        assert_eq!(envelope.history.len(), 1);
        assert_eq!(envelope.history[0].status, SagaStatus::Success);
        assert_eq!(envelope.history[0].message, "done");
    }

    #[test]
    fn stamp_does_not_append_history() {
        let mut envelope = sample_envelope();
        envelope.stamp(EventSource::Orchestrator, SagaStatus::Success);

        assert_eq!(envelope.status, Some(SagaStatus::Success));
        assert!(envelope.history.is_empty());
    }

    #[test]
    fn history_grows_one_entry_per_visit() {
        let mut envelope = sample_envelope();
        envelope.mark_success(EventSource::ProductValidationService, "validated");
        envelope.mark_rollback_pending(EventSource::PaymentService, "too low");
        envelope.mark_fail(EventSource::PaymentService, "refunded");

        assert_eq!(envelope.history.len(), 3);
        assert_eq!(envelope.status, Some(SagaStatus::Fail));
        assert_eq!(envelope.source, Some(EventSource::PaymentService));
    }

    #[test]
    fn wire_shape_uses_camel_case_and_omits_unset_fields() {
        let envelope = sample_envelope();
        let json = serde_json::to_value(&envelope).unwrap();

        assert!(json.get("id").is_some());
        assert!(json.get("transactionId").is_some());
        assert!(json.get("orderId").is_some());
        assert!(json.get("status").is_none());
        assert!(json.get("source").is_none());
        assert_eq!(json["history"], serde_json::json!([]));
    }

    #[test]
    fn status_and_source_use_screaming_snake_tags() {
        let mut envelope = sample_envelope();
        envelope.mark_rollback_pending(EventSource::InventoryService, "out of stock");
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["status"], "ROLLBACK_PENDING");
        assert_eq!(json["source"], "INVENTORY_SERVICE");
        assert_eq!(json["history"][0]["status"], "ROLLBACK_PENDING");
        assert!(json["history"][0].get("createdAt").is_some());
    }

    #[test]
    fn wire_roundtrip_preserves_envelope() {
        let mut envelope = sample_envelope();
        envelope.mark_success(EventSource::ProductValidationService, "validated");
        let raw = serde_json::to_string(&envelope).unwrap();
        let decoded: SagaEnvelope = serde_json::from_str(&raw).unwrap();

        assert_eq!(decoded.id, envelope.id);
        assert_eq!(decoded.transaction_id, envelope.transaction_id);
        assert_eq!(decoded.status, envelope.status);
        assert_eq!(decoded.history, envelope.history);
    }

    #[test]
    fn decodes_wire_example_without_optional_fields() {
        let raw = r#"{
            "id": "0bd41b9e-66a1-4023-9c87-0a1b0b6c4c2a",
            "transactionId": "1724228586123_6b3e4f0a-8b31-4e8f-9c2d-1d2e3f4a5b6c",
            "orderId": "9fd5f6f1-2f4e-4f9f-8b1a-3c5d7e9f0a1b",
            "payload": {
                "id": "9fd5f6f1-2f4e-4f9f-8b1a-3c5d7e9f0a1b",
                "products": [{"product": {"code": "BOOKS", "unitValue": 5.0}, "quantity": 1}]
            },
            "history": []
        }"#;
        let decoded: SagaEnvelope = serde_json::from_str(raw).unwrap();

        assert!(decoded.status.is_none());
        assert!(decoded.source.is_none());
        assert_eq!(decoded.payload.products[0].product.code, "BOOKS");
    }
}
