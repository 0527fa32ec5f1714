//! PostgreSQL-backed order store and saga event log.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{OrderId, TransactionId};
use messaging::SagaEnvelope;

use crate::error::Result;
use crate::model::Order;
use crate::store::{LoggedEvent, OrderStore, SagaLog};

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let products_json: serde_json::Value = row.try_get("products")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            products: serde_json::from_value(products_json)?,
            transaction_id: TransactionId::from_string(
                row.try_get::<String, _>("transaction_id")?,
            ),
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn save(&self, order: &Order) -> Result<()> {
        let products_json = serde_json::to_value(&order.products)?;
        sqlx::query(
            r#"
            INSERT INTO orders (id, products, transaction_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(products_json)
        .bind(order.transaction_id.as_str())
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, products, transaction_id, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }
}

/// PostgreSQL-backed saga event log.
#[derive(Clone)]
pub struct PostgresSagaLog {
    pool: PgPool,
}

impl PostgresSagaLog {
    /// Creates a log over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: PgRow) -> Result<LoggedEvent> {
        let envelope_json: serde_json::Value = row.try_get("envelope")?;
        Ok(LoggedEvent {
            envelope: serde_json::from_value(envelope_json)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl SagaLog for PostgresSagaLog {
    async fn save(&self, envelope: &SagaEnvelope) -> Result<()> {
        let envelope_json = serde_json::to_value(envelope)?;
        sqlx::query(
            r#"
            INSERT INTO saga_events (id, order_id, transaction_id, envelope, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (id)
            DO UPDATE SET envelope = EXCLUDED.envelope, created_at = NOW()
            "#,
        )
        .bind(envelope.id.as_uuid())
        .bind(envelope.order_id.as_uuid())
        .bind(envelope.transaction_id.as_str())
        .bind(envelope_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<LoggedEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT envelope, created_at
            FROM saga_events
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn find_latest_by_order_id(&self, order_id: OrderId) -> Result<Option<LoggedEvent>> {
        let row = sqlx::query(
            r#"
            SELECT envelope, created_at
            FROM saga_events
            WHERE order_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_event).transpose()
    }

    async fn find_latest_by_transaction_id(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<LoggedEvent>> {
        let row = sqlx::query(
            r#"
            SELECT envelope, created_at
            FROM saga_events
            WHERE transaction_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(transaction_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_event).transpose()
    }
}
