use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::sync::mpsc;

use crate::{MessageBus, Result, SagaEnvelope, Subscription, Topic};

/// In-memory topic broker for tests and single-process deployments.
///
/// Every subscriber to a topic receives every message published to it, in
/// publish order. Messages published to a topic with no live subscriber are
/// dropped, so wiring must open all subscriptions before the first envelope
/// is published.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    topics: Arc<RwLock<HashMap<Topic, Vec<mpsc::UnboundedSender<String>>>>>,
}

impl InMemoryBroker {
    /// Creates a new broker with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live subscriptions for a topic.
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics
            .read()
            .await
            .get(&topic)
            .map_or(0, |subscribers| subscribers.len())
    }
}

#[async_trait]
impl MessageBus for InMemoryBroker {
    async fn publish(&self, topic: Topic, envelope: &SagaEnvelope) -> Result<()> {
        let raw = serde_json::to_string(envelope)?;

        let mut topics = self.topics.write().await;
        if let Some(subscribers) = topics.get_mut(&topic) {
            subscribers.retain(|sender| sender.send(raw.clone()).is_ok());
        }

        metrics::counter!("messages_published_total", "topic" => topic.as_str()).increment(1);
        tracing::debug!(topic = %topic, event_id = %envelope.id, "published envelope");
        Ok(())
    }

    async fn subscribe(&self, topic: Topic) -> Result<Subscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.topics
            .write()
            .await
            .entry(topic)
            .or_default()
            .push(sender);
        Ok(Subscription::new(topic, receiver))
    }
}
