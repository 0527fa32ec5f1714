//! Order intake endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use messaging::{InMemoryBroker, OrderItem, SagaEnvelope};
use order::{Order, OrderService, OrderStore, SagaLog};
use serde::Deserialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<O: OrderStore, L: SagaLog> {
    pub order_service: Arc<OrderService<InMemoryBroker, O, L>>,
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub products: Vec<OrderItem>,
}

/// POST /orders, accepts an order and starts its saga.
///
/// Replies with the envelope as it was handed to the orchestrator. The saga
/// itself runs on the workers; its progress is visible through `/events`.
#[tracing::instrument(skip(state, req))]
pub async fn create<O: OrderStore + 'static, L: SagaLog + 'static>(
    State(state): State<Arc<AppState<O, L>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<SagaEnvelope>), ApiError> {
    let envelope = state.order_service.create_order(req.products).await?;
    Ok((axum::http::StatusCode::CREATED, Json(envelope)))
}

/// GET /orders/{id}, fetches an accepted order.
#[tracing::instrument(skip(state))]
pub async fn get<O: OrderStore + 'static, L: SagaLog + 'static>(
    State(state): State<Arc<AppState<O, L>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;

    let order = state
        .order_service
        .find_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order))
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
