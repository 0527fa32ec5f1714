//! Per-stage ledgers keyed by saga attempt.
//!
//! Every stage persists one record per `(order_id, transaction_id)` pair.
//! The record makes the stage's effect reversible, and its existence doubles
//! as the idempotency signal for replayed envelopes.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use common::{OrderId, TransactionId};
use messaging::SagaEnvelope;

use crate::error::{Result, StageError};

/// Key identifying one saga attempt in a stage ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
}

impl LedgerKey {
    /// Creates a key from its parts.
    pub fn new(order_id: OrderId, transaction_id: TransactionId) -> Self {
        Self {
            order_id,
            transaction_id,
        }
    }

    /// Extracts the attempt key from an envelope.
    pub fn from_envelope(envelope: &SagaEnvelope) -> Self {
        Self {
            order_id: envelope.order_id,
            transaction_id: envelope.transaction_id.clone(),
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.order_id, self.transaction_id)
    }
}

/// Storage for one stage's attempt records.
///
/// `insert_new` must be atomic: when two concurrent inserts race on the same
/// key, exactly one wins and the other observes `DuplicateTransaction`.
/// There is no separate check-then-act window.
#[async_trait]
pub trait LedgerStore<R>: Send + Sync
where
    R: Clone + Send + Sync + 'static,
{
    /// True if a record exists for this attempt.
    async fn exists(&self, key: &LedgerKey) -> Result<bool>;

    /// Atomically inserts the record for a new attempt.
    async fn insert_new(&self, key: LedgerKey, record: R) -> Result<()>;

    /// Fetches the record for an attempt.
    async fn find(&self, key: &LedgerKey) -> Result<Option<R>>;

    /// Stores the record for an attempt, replacing any previous value.
    async fn update(&self, key: &LedgerKey, record: R) -> Result<()>;
}

/// In-memory ledger backed by a hash map.
pub struct InMemoryLedger<R> {
    records: Arc<RwLock<HashMap<LedgerKey, R>>>,
}

impl<R> InMemoryLedger<R> {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts recorded.
    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }
}

impl<R> Default for InMemoryLedger<R> {
    fn default() -> Self {
        Self {
            records: Arc::default(),
        }
    }
}

impl<R> Clone for InMemoryLedger<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

#[async_trait]
impl<R> LedgerStore<R> for InMemoryLedger<R>
where
    R: Clone + Send + Sync + 'static,
{
    async fn exists(&self, key: &LedgerKey) -> Result<bool> {
        Ok(self.records.read().unwrap().contains_key(key))
    }

    async fn insert_new(&self, key: LedgerKey, record: R) -> Result<()> {
        let mut records = self.records.write().unwrap();
        match records.entry(key) {
            Entry::Occupied(entry) => Err(StageError::DuplicateTransaction {
                order_id: entry.key().order_id,
                transaction_id: entry.key().transaction_id.clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
        }
    }

    async fn find(&self, key: &LedgerKey) -> Result<Option<R>> {
        Ok(self.records.read().unwrap().get(key).cloned())
    }

    async fn update(&self, key: &LedgerKey, record: R) -> Result<()> {
        self.records.write().unwrap().insert(key.clone(), record);
        Ok(())
    }
}
