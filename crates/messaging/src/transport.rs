use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{MessagingError, Result, SagaEnvelope, Topic};

/// A live subscription to one topic.
///
/// Messages arrive in the order they were published. Decoding happens at
/// receive time so a malformed message surfaces to the consumer instead of
/// poisoning the transport.
pub struct Subscription {
    topic: Topic,
    receiver: mpsc::UnboundedReceiver<String>,
}

impl Subscription {
    pub(crate) fn new(topic: Topic, receiver: mpsc::UnboundedReceiver<String>) -> Self {
        Self { topic, receiver }
    }

    /// The topic this subscription consumes.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Waits for the next envelope; returns `None` once the publisher side
    /// is gone and the backlog is drained.
    pub async fn recv(&mut self) -> Option<Result<SagaEnvelope>> {
        let raw = self.receiver.recv().await?;
        Some(serde_json::from_str(&raw).map_err(MessagingError::from))
    }
}

/// Publish/subscribe transport carrying saga envelopes between workers.
///
/// Implementations provide at-least-once delivery and preserve per-topic
/// publish order. Consumers rely on never seeing a compensation for a
/// transaction before the forward result that caused it, so a transport that
/// reorders messages within one `(orderId, transactionId)` pair is not a
/// valid backing for this trait.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes an envelope to a topic.
    async fn publish(&self, topic: Topic, envelope: &SagaEnvelope) -> Result<()>;

    /// Opens a new subscription to a topic.
    async fn subscribe(&self, topic: Topic) -> Result<Subscription>;
}
