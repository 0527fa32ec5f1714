//! Routing table for saga decisions.

use std::collections::HashMap;

use messaging::{EventSource, SagaStatus, Topic};

use crate::error::{OrchestrationError, Result};
use crate::pipeline::StagePipeline;

/// Immutable map from `(source, status)` to the next topic.
///
/// Derived from the stage pipeline once at startup; lookups never mutate it.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    routes: HashMap<(EventSource, SagaStatus), Topic>,
}

impl TransitionTable {
    /// Builds the routing table for a pipeline.
    ///
    /// SUCCESS chains each stage to its successor and the last stage to
    /// finish-success. ROLLBACK_PENDING points at the reporting stage's own
    /// compensation topic. FAIL points at the previous stage's compensation
    /// topic, and the first stage's FAIL closes the saga as failed.
    pub fn from_pipeline(pipeline: &StagePipeline) -> Self {
        let mut routes = HashMap::new();
        let stages = pipeline.stages();

        routes.insert(
            (EventSource::Orchestrator, SagaStatus::Success),
            stages
                .first()
                .map_or(Topic::FinishSuccess, |route| route.forward),
        );
        routes.insert(
            (EventSource::Orchestrator, SagaStatus::Fail),
            Topic::FinishFail,
        );

        for (index, route) in stages.iter().enumerate() {
            let on_success = stages
                .get(index + 1)
                .map_or(Topic::FinishSuccess, |next| next.forward);
            let on_fail = index
                .checked_sub(1)
                .map_or(Topic::FinishFail, |previous| stages[previous].compensate);

            routes.insert((route.source, SagaStatus::Success), on_success);
            routes.insert((route.source, SagaStatus::RollbackPending), route.compensate);
            routes.insert((route.source, SagaStatus::Fail), on_fail);
        }

        Self { routes }
    }

    /// Looks up the next topic for a routing decision.
    pub fn next_topic(&self, source: EventSource, status: SagaStatus) -> Option<Topic> {
        self.routes.get(&(source, status)).copied()
    }

    /// Number of routing rows.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Verifies the table routes every decision the system can produce.
    ///
    /// The orchestrator reports SUCCESS and FAIL; every stage reports all
    /// three statuses. A hole would strand envelopes at runtime, so startup
    /// refuses the table instead.
    pub fn validate_totality(&self, pipeline: &StagePipeline) -> Result<()> {
        for status in [SagaStatus::Success, SagaStatus::Fail] {
            if self.next_topic(EventSource::Orchestrator, status).is_none() {
                return Err(OrchestrationError::IncompleteTable {
                    source: EventSource::Orchestrator,
                    status,
                });
            }
        }

        let statuses = [
            SagaStatus::Success,
            SagaStatus::RollbackPending,
            SagaStatus::Fail,
        ];
        for route in pipeline.stages() {
            for status in statuses {
                if self.next_topic(route.source, status).is_none() {
                    return Err(OrchestrationError::IncompleteTable {
                        source: route.source,
                        status,
                    });
                }
            }
        }
        Ok(())
    }
}
