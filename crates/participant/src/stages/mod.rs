//! The business stages instantiated on the generic engine.

pub mod inventory;
pub mod payment;
pub mod product_validation;

pub use inventory::{
    InMemoryInventoryLevels, InventoryLevelStore, InventoryMovement, InventoryStage,
};
pub use payment::{MIN_AMOUNT, PaymentRecord, PaymentStage, PaymentStatus};
pub use product_validation::{
    InMemoryProductCatalog, ProductCatalog, ProductValidationStage, ValidationRecord,
};
