//! The ordered stage pipeline.

use messaging::{EventSource, Topic};

/// One stage's place in the pipeline: who reports for it and where its work
/// and rollback are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRoute {
    pub source: EventSource,
    pub forward: Topic,
    pub compensate: Topic,
}

/// Ordered list of saga stages. Forward execution walks it left to right;
/// compensation walks it back.
#[derive(Debug, Clone)]
pub struct StagePipeline {
    stages: Vec<StageRoute>,
}

impl StagePipeline {
    /// The production pipeline: product validation, then payment, then
    /// inventory.
    pub fn standard() -> Self {
        Self {
            stages: vec![
                StageRoute {
                    source: EventSource::ProductValidationService,
                    forward: Topic::ProductValidationSuccess,
                    compensate: Topic::ProductValidationFail,
                },
                StageRoute {
                    source: EventSource::PaymentService,
                    forward: Topic::PaymentSuccess,
                    compensate: Topic::PaymentFail,
                },
                StageRoute {
                    source: EventSource::InventoryService,
                    forward: Topic::InventorySuccess,
                    compensate: Topic::InventoryFail,
                },
            ],
        }
    }

    /// Stages in forward order.
    pub fn stages(&self) -> &[StageRoute] {
        &self.stages
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True if the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_pipeline_orders_the_three_stages() {
        let pipeline = StagePipeline::standard();

        assert_eq!(pipeline.len(), 3);
        let sources: Vec<_> = pipeline.stages().iter().map(|route| route.source).collect();
        assert_eq!(
            sources,
            vec![
                EventSource::ProductValidationService,
                EventSource::PaymentService,
                EventSource::InventoryService,
            ]
        );
    }

    #[test]
    fn every_stage_pairs_forward_and_compensation_topics() {
        let pipeline = StagePipeline::standard();

        for route in pipeline.stages() {
            assert_ne!(route.forward, route.compensate);
            assert!(!route.forward.is_terminal());
            assert!(!route.compensate.is_terminal());
        }
    }
}
