//! Product validation stage: confirms every ordered product exists.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use messaging::{EventSource, SagaEnvelope};

use crate::engine::{StageBehavior, StageMessages};
use crate::error::{Result, StageError};
use crate::ledger::{LedgerKey, LedgerStore};

/// Ledger record for one validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// True after the forward pass; flipped to false by compensation.
    pub success: bool,
}

/// Read access to the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// True if a product with this code exists.
    async fn contains(&self, code: &str) -> Result<bool>;
}

/// In-memory catalog of known product codes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    codes: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryProductCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a product code to the catalog.
    pub fn add(&self, code: impl Into<String>) {
        self.codes.write().unwrap().insert(code.into());
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn contains(&self, code: &str) -> Result<bool> {
        Ok(self.codes.read().unwrap().contains(code))
    }
}

/// First pipeline stage: every ordered product must be known to the catalog.
pub struct ProductValidationStage<L, C> {
    ledger: L,
    catalog: C,
}

impl<L, C> ProductValidationStage<L, C>
where
    L: LedgerStore<ValidationRecord>,
    C: ProductCatalog,
{
    pub fn new(ledger: L, catalog: C) -> Self {
        Self { ledger, catalog }
    }

    /// Read access to the stage ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

#[async_trait]
impl<L, C> StageBehavior for ProductValidationStage<L, C>
where
    L: LedgerStore<ValidationRecord>,
    C: ProductCatalog,
{
    fn source(&self) -> EventSource {
        EventSource::ProductValidationService
    }

    fn messages(&self) -> StageMessages {
        StageMessages {
            success: "Products are validated successfully!",
            failure_prefix: "Fail to validate products",
            compensated: "Rollback executed on product validation!",
            compensation_failed_prefix: "Rollback not executed on product validation",
        }
    }

    async fn already_processed(&self, key: &LedgerKey) -> Result<bool> {
        self.ledger.exists(key).await
    }

    async fn precheck(&self, envelope: &SagaEnvelope) -> Result<()> {
        if envelope.payload.products.is_empty() {
            return Err(StageError::Validation("Products list is empty!".to_string()));
        }
        for item in &envelope.payload.products {
            if item.product.code.trim().is_empty() {
                return Err(StageError::Validation("Product must be informed!".to_string()));
            }
            if !self.catalog.contains(&item.product.code).await? {
                return Err(StageError::Validation(format!(
                    "Product code {} does not exist in the catalog!",
                    item.product.code
                )));
            }
        }
        Ok(())
    }

    async fn execute(&self, envelope: &mut SagaEnvelope) -> Result<()> {
        let key = LedgerKey::from_envelope(envelope);
        self.ledger
            .insert_new(key, ValidationRecord { success: true })
            .await
    }

    async fn compensate(&self, envelope: &SagaEnvelope) -> Result<()> {
        let key = LedgerKey::from_envelope(envelope);
        // Upsert: a missing record means the forward pass never committed,
        // yet the failed marker is still stored for the audit trail.
        self.ledger
            .update(&key, ValidationRecord { success: false })
            .await
    }
}
