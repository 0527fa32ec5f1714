/// Logical topic names for the saga pipeline.
///
/// One forward and one compensation topic per stage, the two coordinator
/// inbound topics, the two terminal topics, and the notification topic the
/// finalizer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Fresh envelopes from the initiator, not yet routed.
    StartSaga,
    /// Stage results waiting for a routing decision.
    Orchestrator,
    ProductValidationSuccess,
    ProductValidationFail,
    PaymentSuccess,
    PaymentFail,
    InventorySuccess,
    InventoryFail,
    FinishSuccess,
    FinishFail,
    /// Terminal envelopes on their way to the finalizer.
    NotifyEnding,
}

impl Topic {
    /// Returns the topic's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::StartSaga => "start-saga",
            Topic::Orchestrator => "orchestrator",
            Topic::ProductValidationSuccess => "product-validation-success",
            Topic::ProductValidationFail => "product-validation-fail",
            Topic::PaymentSuccess => "payment-success",
            Topic::PaymentFail => "payment-fail",
            Topic::InventorySuccess => "inventory-success",
            Topic::InventoryFail => "inventory-fail",
            Topic::FinishSuccess => "finish-success",
            Topic::FinishFail => "finish-fail",
            Topic::NotifyEnding => "notify-ending",
        }
    }

    /// True for the two topics that end a saga.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Topic::FinishSuccess | Topic::FinishFail)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
