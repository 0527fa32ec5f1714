//! The saga orchestrator: stamps, routes, publishes.

use messaging::{EventSource, MessageBus, SagaEnvelope, SagaStatus, Topic};

use crate::error::{OrchestrationError, Result};
use crate::pipeline::StagePipeline;
use crate::transition::TransitionTable;

/// Routes saga envelopes according to the transition table.
///
/// The orchestrator never appends history; stages own the audit trail. It
/// stamps its own source and status onto envelopes it originates or closes,
/// resolves the next topic from the table and publishes.
pub struct Orchestrator<M> {
    table: TransitionTable,
    bus: M,
}

impl<M> Orchestrator<M>
where
    M: MessageBus,
{
    /// Creates an orchestrator, refusing any table that cannot route every
    /// reachable decision.
    pub fn new(pipeline: &StagePipeline, bus: M) -> Result<Self> {
        let table = TransitionTable::from_pipeline(pipeline);
        table.validate_totality(pipeline)?;
        Ok(Self { table, bus })
    }

    /// Read access to the routing table.
    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Admits a brand-new saga: stamp ORCHESTRATOR/SUCCESS and route it to
    /// the first stage.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            order_id = %envelope.order_id,
            transaction_id = %envelope.transaction_id,
            event_id = %envelope.id,
        )
    )]
    pub async fn start_saga(&self, mut envelope: SagaEnvelope) -> Result<()> {
        envelope.stamp(EventSource::Orchestrator, SagaStatus::Success);
        tracing::info!("saga started");
        self.route(EventSource::Orchestrator, SagaStatus::Success, envelope)
            .await
    }

    /// Routes a stage report to its next topic.
    ///
    /// An envelope without source or status cannot be routed; that is a bug
    /// in a participant and is surfaced as an error instead of guessed
    /// around.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            order_id = %envelope.order_id,
            transaction_id = %envelope.transaction_id,
            event_id = %envelope.id,
        )
    )]
    pub async fn continue_saga(&self, envelope: SagaEnvelope) -> Result<()> {
        let (source, status) = match (envelope.source, envelope.status) {
            (Some(source), Some(status)) => (source, status),
            _ => {
                return Err(OrchestrationError::MissingRoutingMetadata {
                    event_id: envelope.id,
                });
            }
        };
        self.route(source, status, envelope).await
    }

    /// Closes a successful saga: stamp ORCHESTRATOR/SUCCESS and notify.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            order_id = %envelope.order_id,
            transaction_id = %envelope.transaction_id,
            event_id = %envelope.id,
        )
    )]
    pub async fn finish_saga_success(&self, mut envelope: SagaEnvelope) -> Result<()> {
        envelope.stamp(EventSource::Orchestrator, SagaStatus::Success);
        tracing::info!("saga finished successfully");
        metrics::counter!("saga_completed_total", "outcome" => "success").increment(1);
        self.bus.publish(Topic::NotifyEnding, &envelope).await?;
        Ok(())
    }

    /// Closes a failed saga: stamp ORCHESTRATOR/FAIL and notify.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            order_id = %envelope.order_id,
            transaction_id = %envelope.transaction_id,
            event_id = %envelope.id,
        )
    )]
    pub async fn finish_saga_fail(&self, mut envelope: SagaEnvelope) -> Result<()> {
        envelope.stamp(EventSource::Orchestrator, SagaStatus::Fail);
        tracing::info!("saga finished with failure");
        metrics::counter!("saga_completed_total", "outcome" => "fail").increment(1);
        self.bus.publish(Topic::NotifyEnding, &envelope).await?;
        Ok(())
    }

    async fn route(
        &self,
        source: EventSource,
        status: SagaStatus,
        envelope: SagaEnvelope,
    ) -> Result<()> {
        let topic = self
            .table
            .next_topic(source, status)
            .ok_or(OrchestrationError::UnroutableDecision { source, status })?;

        let direction = match status {
            SagaStatus::Success => "forward",
            SagaStatus::RollbackPending => "compensate_current",
            SagaStatus::Fail => "compensate_previous",
        };
        tracing::info!(%source, %status, next_topic = %topic, direction, "routing decision");
        metrics::counter!(
            "saga_routing_decisions_total",
            "source" => source.as_str(),
            "status" => status.as_str(),
        )
        .increment(1);

        self.bus.publish(topic, &envelope).await?;
        Ok(())
    }
}
