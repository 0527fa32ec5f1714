//! Participant side of the order saga.
//!
//! Every stage follows the same protocol: refuse replays, validate
//! preconditions, apply the business effect with a reversible ledger record,
//! then report the outcome to the orchestrator in exactly one published
//! envelope. The protocol is implemented once in [`StageEngine`]; product
//! validation, payment and inventory plug in through [`StageBehavior`].

pub mod engine;
pub mod error;
pub mod ledger;
pub mod stages;

pub use engine::{StageBehavior, StageEngine, StageMessages};
pub use error::{Result, StageError};
pub use ledger::{InMemoryLedger, LedgerKey, LedgerStore};
pub use stages::inventory::{
    InMemoryInventoryLevels, InventoryLevelStore, InventoryMovement, InventoryStage,
};
pub use stages::payment::{MIN_AMOUNT, PaymentRecord, PaymentStage, PaymentStatus};
pub use stages::product_validation::{
    InMemoryProductCatalog, ProductCatalog, ProductValidationStage, ValidationRecord,
};
