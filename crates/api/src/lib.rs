//! HTTP API server with observability for the order saga system.
//!
//! Provides REST endpoints for order intake and saga event queries, with
//! structured logging (tracing) and Prometheus metrics. The saga itself
//! runs on background workers spawned by [`runtime::SagaSystem`].

pub mod config;
pub mod error;
pub mod routes;
pub mod runtime;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use order::{OrderStore, SagaLog};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<O: OrderStore + 'static, L: SagaLog + 'static>(
    state: Arc<AppState<O, L>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<O, L>))
        .route("/orders/{id}", get(routes::orders::get::<O, L>))
        .route("/events", get(routes::events::list::<O, L>))
        .route("/events/find", get(routes::events::find::<O, L>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
