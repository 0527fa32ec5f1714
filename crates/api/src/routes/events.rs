//! Saga event log query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use common::TransactionId;
use order::{LoggedEvent, OrderStore, SagaLog};
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::orders::{AppState, parse_order_id};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilters {
    pub order_id: Option<String>,
    pub transaction_id: Option<String>,
}

/// GET /events, lists every logged saga event, latest first.
#[tracing::instrument(skip(state))]
pub async fn list<O: OrderStore + 'static, L: SagaLog + 'static>(
    State(state): State<Arc<AppState<O, L>>>,
) -> Result<Json<Vec<LoggedEvent>>, ApiError> {
    let events = state.order_service.find_all_events().await?;
    Ok(Json(events))
}

/// GET /events/find, returns the latest event matching the given filters.
///
/// At least one of `orderId` and `transactionId` must be present; the order
/// id wins when both are given.
#[tracing::instrument(skip(state))]
pub async fn find<O: OrderStore + 'static, L: SagaLog + 'static>(
    State(state): State<Arc<AppState<O, L>>>,
    Query(filters): Query<EventFilters>,
) -> Result<Json<LoggedEvent>, ApiError> {
    let order_id = filters
        .order_id
        .as_deref()
        .map(parse_order_id)
        .transpose()?;
    let transaction_id = filters.transaction_id.map(TransactionId::from_string);

    let event = state
        .order_service
        .find_event_by_filters(order_id, transaction_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("No saga event found for the given filters".to_string())
        })?;

    Ok(Json(event))
}
