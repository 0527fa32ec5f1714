//! The generic stage engine.
//!
//! All three business stages follow one protocol: guard against replays,
//! validate preconditions, apply the effect, then report the outcome to the
//! orchestrator. The protocol lives here; stages only implement
//! [`StageBehavior`].

use std::time::Instant;

use async_trait::async_trait;

use messaging::{EventSource, MessageBus, SagaEnvelope, Topic};

use crate::error::{Result, StageError};
use crate::ledger::LedgerKey;

/// History wording for one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageMessages {
    /// Appended on a successful forward pass.
    pub success: &'static str,
    /// Prefixed to the failure reason when the forward pass fails.
    pub failure_prefix: &'static str,
    /// Appended when compensation completes.
    pub compensated: &'static str,
    /// Prefixed to the reason when compensation itself fails.
    pub compensation_failed_prefix: &'static str,
}

/// The capability interface one business stage implements.
///
/// Implementations own the business effect and its reversal; the engine owns
/// everything else, including the guarantee that exactly one envelope is
/// published per handled message.
#[async_trait]
pub trait StageBehavior: Send + Sync {
    /// Tag written into the envelope when this stage reports.
    fn source(&self) -> EventSource;

    /// History wording for this stage.
    fn messages(&self) -> StageMessages;

    /// True if a ledger record already exists for the attempt.
    async fn already_processed(&self, key: &LedgerKey) -> Result<bool>;

    /// Validates stage preconditions in a fixed order. The first violation
    /// fails the attempt with its reason; nothing is persisted.
    async fn precheck(&self, envelope: &SagaEnvelope) -> Result<()>;

    /// Applies the business effect and persists the ledger record that makes
    /// it reversible. The record insert is the atomic commit point for the
    /// attempt key.
    async fn execute(&self, envelope: &mut SagaEnvelope) -> Result<()>;

    /// Reverses a previously recorded effect. A missing ledger record means
    /// the forward pass never committed; the stage still leaves a synthetic
    /// record behind so the attempt shows in the ledger.
    async fn compensate(&self, envelope: &SagaEnvelope) -> Result<()>;
}

/// Drives the stage protocol for one behavior over one bus.
///
/// Both entry points consume an envelope, fold the business outcome into its
/// status and history, and publish it to the orchestrator topic. The only
/// error they return is a failure of that final publish.
pub struct StageEngine<B, M> {
    behavior: B,
    bus: M,
}

impl<B, M> StageEngine<B, M>
where
    B: StageBehavior,
    M: MessageBus,
{
    /// Creates an engine for one stage.
    pub fn new(behavior: B, bus: M) -> Self {
        Self { behavior, bus }
    }

    /// Read access to the wrapped behavior.
    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    /// Handles an envelope delivered on this stage's forward topic.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            stage = %self.behavior.source(),
            order_id = %envelope.order_id,
            transaction_id = %envelope.transaction_id,
            event_id = %envelope.id,
        )
    )]
    pub async fn run_forward(&self, mut envelope: SagaEnvelope) -> Result<()> {
        let source = self.behavior.source();
        let messages = self.behavior.messages();
        let started = Instant::now();

        match self.attempt(&mut envelope).await {
            Ok(()) => {
                tracing::info!("stage completed");
                metrics::counter!(
                    "saga_stage_forward_total",
                    "stage" => source.as_str(),
                    "outcome" => "success",
                )
                .increment(1);
                envelope.mark_success(source, messages.success);
            }
            Err(reason) => {
                tracing::warn!(%reason, "stage failed, requesting rollback");
                metrics::counter!(
                    "saga_stage_forward_total",
                    "stage" => source.as_str(),
                    "outcome" => "rollback_pending",
                )
                .increment(1);
                envelope.mark_rollback_pending(
                    source,
                    format!("{}: {}", messages.failure_prefix, reason),
                );
            }
        }

        metrics::histogram!("saga_stage_duration_seconds", "stage" => source.as_str())
            .record(started.elapsed().as_secs_f64());

        self.bus.publish(Topic::Orchestrator, &envelope).await?;
        Ok(())
    }

    async fn attempt(&self, envelope: &mut SagaEnvelope) -> Result<()> {
        let key = LedgerKey::from_envelope(envelope);
        if self.behavior.already_processed(&key).await? {
            return Err(StageError::DuplicateTransaction {
                order_id: key.order_id,
                transaction_id: key.transaction_id,
            });
        }
        self.behavior.precheck(envelope).await?;
        self.behavior.execute(envelope).await
    }

    /// Handles an envelope delivered on this stage's compensation topic.
    ///
    /// The envelope always leaves with status FAIL. A compensation error is
    /// recorded in history and logged, never retried here.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            stage = %self.behavior.source(),
            order_id = %envelope.order_id,
            transaction_id = %envelope.transaction_id,
            event_id = %envelope.id,
        )
    )]
    pub async fn run_compensation(&self, mut envelope: SagaEnvelope) -> Result<()> {
        let source = self.behavior.source();
        let messages = self.behavior.messages();

        match self.behavior.compensate(&envelope).await {
            Ok(()) => {
                tracing::info!("compensation applied");
                metrics::counter!(
                    "saga_stage_compensation_total",
                    "stage" => source.as_str(),
                    "outcome" => "success",
                )
                .increment(1);
                envelope.mark_fail(source, messages.compensated);
            }
            Err(reason) => {
                // TODO: route unrecoverable compensation failures to a
                // dead-letter topic instead of leaving them to the logs.
                tracing::error!(%reason, "compensation failed, manual remediation required");
                metrics::counter!(
                    "saga_stage_compensation_total",
                    "stage" => source.as_str(),
                    "outcome" => "failed",
                )
                .increment(1);
                envelope.mark_fail(
                    source,
                    format!("{}: {}", messages.compensation_failed_prefix, reason),
                );
            }
        }

        self.bus.publish(Topic::Orchestrator, &envelope).await?;
        Ok(())
    }
}
