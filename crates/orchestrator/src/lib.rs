//! Orchestration for the order saga.
//!
//! The saga's control flow is one lookup table: `(reporting source, status)`
//! maps to the next topic. The table is derived from the ordered stage
//! pipeline at startup, checked for totality, and consulted for every
//! envelope that reaches the orchestrator. Forward progress, targeted
//! rollback and the reverse compensation chain all fall out of the same
//! eleven rows.

pub mod error;
pub mod pipeline;
pub mod service;
pub mod transition;

pub use error::{OrchestrationError, Result};
pub use pipeline::{StagePipeline, StageRoute};
pub use service::Orchestrator;
pub use transition::TransitionTable;
