//! Inventory stage: deducts ordered quantities from per-product stock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use messaging::{EventSource, SagaEnvelope};

use crate::engine::{StageBehavior, StageMessages};
use crate::error::{Result, StageError};
use crate::ledger::{LedgerKey, LedgerStore};

/// One stock movement recorded for later reversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub product_code: String,
    pub old_quantity: u32,
    pub order_quantity: u32,
    pub new_quantity: u32,
}

/// Current stock levels, keyed by product code.
#[async_trait]
pub trait InventoryLevelStore: Send + Sync {
    /// Available quantity for a product, if the product is stocked at all.
    async fn available(&self, product_code: &str) -> Result<Option<u32>>;

    /// Sets the available quantity for a product.
    async fn set_available(&self, product_code: &str, quantity: u32) -> Result<()>;
}

/// In-memory stock levels.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryLevels {
    levels: Arc<RwLock<HashMap<String, u32>>>,
}

impl InMemoryInventoryLevels {
    /// Creates an empty level store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryLevelStore for InMemoryInventoryLevels {
    async fn available(&self, product_code: &str) -> Result<Option<u32>> {
        Ok(self.levels.read().unwrap().get(product_code).copied())
    }

    async fn set_available(&self, product_code: &str, quantity: u32) -> Result<()> {
        self.levels
            .write()
            .unwrap()
            .insert(product_code.to_string(), quantity);
        Ok(())
    }
}

/// Last pipeline stage: reserve stock by deducting it.
pub struct InventoryStage<L, S> {
    ledger: L,
    levels: S,
}

impl<L, S> InventoryStage<L, S>
where
    L: LedgerStore<Vec<InventoryMovement>>,
    S: InventoryLevelStore,
{
    pub fn new(ledger: L, levels: S) -> Self {
        Self { ledger, levels }
    }

    /// Read access to the stage ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Read access to the level store.
    pub fn levels(&self) -> &S {
        &self.levels
    }

    async fn stock_of(&self, product_code: &str) -> Result<u32> {
        self.levels.available(product_code).await?.ok_or_else(|| {
            StageError::Validation(format!(
                "No inventory found for product code {product_code}!"
            ))
        })
    }
}

#[async_trait]
impl<L, S> StageBehavior for InventoryStage<L, S>
where
    L: LedgerStore<Vec<InventoryMovement>>,
    S: InventoryLevelStore,
{
    fn source(&self) -> EventSource {
        EventSource::InventoryService
    }

    fn messages(&self) -> StageMessages {
        StageMessages {
            success: "Inventory updated successfully!",
            failure_prefix: "Fail to update inventory",
            compensated: "Rollback executed for inventory!",
            compensation_failed_prefix: "Rollback not executed for inventory",
        }
    }

    async fn already_processed(&self, key: &LedgerKey) -> Result<bool> {
        self.ledger.exists(key).await
    }

    async fn precheck(&self, envelope: &SagaEnvelope) -> Result<()> {
        for item in &envelope.payload.products {
            let available = self.stock_of(&item.product.code).await?;
            if item.quantity > available {
                return Err(StageError::Validation("Product is out of stock!".to_string()));
            }
        }
        Ok(())
    }

    async fn execute(&self, envelope: &mut SagaEnvelope) -> Result<()> {
        let key = LedgerKey::from_envelope(envelope);

        // Levels are re-read here: the precheck snapshot may be stale by the
        // time the deduction commits.
        let mut movements = Vec::with_capacity(envelope.payload.products.len());
        for item in &envelope.payload.products {
            let old_quantity = self.stock_of(&item.product.code).await?;
            if item.quantity > old_quantity {
                return Err(StageError::Validation("Product is out of stock!".to_string()));
            }
            movements.push(InventoryMovement {
                product_code: item.product.code.clone(),
                old_quantity,
                order_quantity: item.quantity,
                new_quantity: old_quantity - item.quantity,
            });
        }

        self.ledger.insert_new(key, movements.clone()).await?;

        for movement in &movements {
            self.levels
                .set_available(&movement.product_code, movement.new_quantity)
                .await?;
        }
        Ok(())
    }

    async fn compensate(&self, envelope: &SagaEnvelope) -> Result<()> {
        let key = LedgerKey::from_envelope(envelope);
        match self.ledger.find(&key).await? {
            Some(movements) => {
                for movement in &movements {
                    self.levels
                        .set_available(&movement.product_code, movement.old_quantity)
                        .await?;
                }
                Ok(())
            }
            // Forward pass never committed; keep an empty movement list so
            // the attempt still shows in the ledger.
            None => self.ledger.update(&key, Vec::new()).await,
        }
    }
}
