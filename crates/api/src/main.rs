//! API server entry point.

use api::config::Config;
use api::runtime::SagaSystem;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use order::{
    InMemoryOrderStore, InMemorySagaLog, OrderStore, PostgresOrderStore, PostgresSagaLog, SagaLog,
};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Wires the saga system over the given stores and returns the router.
async fn build_app<O, L>(
    orders: O,
    saga_log: L,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Router
where
    O: OrderStore + 'static,
    L: SagaLog + 'static,
{
    let system = SagaSystem::new(orders, saga_log).expect("transition table is incomplete");
    if config.seed_demo_data {
        system
            .seed_demo_data()
            .await
            .expect("failed to seed demo data");
    }
    system
        .start_workers()
        .await
        .expect("failed to start saga workers");
    api::create_app(system.app_state(), metrics_handle)
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Wire the saga system over the configured stores
    let app = if let Some(database_url) = config.database_url.clone() {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("failed to connect to PostgreSQL");
        let order_store = PostgresOrderStore::new(pool.clone());
        order_store
            .run_migrations()
            .await
            .expect("failed to run migrations");
        let saga_log = PostgresSagaLog::new(pool);
        build_app(order_store, saga_log, &config, metrics_handle).await
    } else {
        build_app(
            InMemoryOrderStore::new(),
            InMemorySagaLog::new(),
            &config,
            metrics_handle,
        )
        .await
    };

    // 4. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
