//! End-to-end saga scenarios driven through the HTTP surface.
//!
//! Each test boots a full in-memory system (broker, workers, orchestrator,
//! stages) and observes outcomes through the saga event log, the stage
//! ledgers and the stock levels.

use std::sync::OnceLock;
use std::time::Duration;

use api::runtime::SagaSystem;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::OrderId;
use messaging::{EventSource, SagaStatus};
use metrics_exporter_prometheus::PrometheusHandle;
use order::{InMemoryOrderStore, InMemorySagaLog, LoggedEvent};
use participant::{InventoryLevelStore, LedgerKey, LedgerStore, PaymentStatus};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

type TestSystem = SagaSystem<InMemoryOrderStore, InMemorySagaLog>;

async fn setup() -> (axum::Router, TestSystem) {
    let system = SagaSystem::new(InMemoryOrderStore::new(), InMemorySagaLog::new()).unwrap();
    system.seed_demo_data().await.unwrap();
    system.start_workers().await.unwrap();
    let app = api::create_app(system.app_state(), get_metrics_handle());
    (app, system)
}

fn order_body(code: &str, unit_value: f64, quantity: u32) -> String {
    serde_json::to_string(&serde_json::json!({
        "products": [{
            "product": { "code": code, "unitValue": unit_value },
            "quantity": quantity
        }]
    }))
    .unwrap()
}

async fn post_order(app: &axum::Router, body: String) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/orders")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

fn order_id_of(created: &serde_json::Value) -> OrderId {
    let raw = created["orderId"].as_str().expect("orderId in response");
    OrderId::from_uuid(uuid::Uuid::parse_str(raw).expect("orderId is a uuid"))
}

/// Polls the saga log until the finalizer has recorded a terminal envelope.
async fn wait_for_ending(system: &TestSystem, order_id: OrderId) -> LoggedEvent {
    for _ in 0..500 {
        let event = system
            .order_service()
            .find_event_by_filters(Some(order_id), None)
            .await
            .unwrap();
        if let Some(event) = event {
            if event.envelope.source == Some(EventSource::Orchestrator)
                && event.envelope.status.is_some()
            {
                return event;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("saga for order {order_id} did not reach a terminal state in time");
}

async fn stock_of(system: &TestSystem, code: &str) -> Option<u32> {
    system
        .inventory_engine()
        .behavior()
        .levels()
        .available(code)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_happy_path_completes_the_saga() {
    let (app, system) = setup().await;

    let (status, created) = post_order(&app, order_body("COMIC_BOOKS", 10.0, 2)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["transactionId"].as_str().is_some());
    assert!(created["history"].as_array().unwrap().is_empty());

    let order_id = order_id_of(&created);
    let ending = wait_for_ending(&system, order_id).await;
    let envelope = &ending.envelope;

    assert_eq!(envelope.status, Some(SagaStatus::Success));
    assert_eq!(envelope.payload.total_amount, Some(20.0));
    assert_eq!(envelope.payload.total_items, Some(2));

    let sources: Vec<EventSource> = envelope.history.iter().map(|e| e.source).collect();
    assert_eq!(
        sources,
        vec![
            EventSource::ProductValidationService,
            EventSource::PaymentService,
            EventSource::InventoryService,
        ]
    );
    assert!(
        envelope
            .history
            .iter()
            .all(|e| e.status == SagaStatus::Success)
    );

    assert_eq!(stock_of(&system, "COMIC_BOOKS").await, Some(8));

    let (status, order) = get_json(&app, &format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["products"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_out_of_stock_order_rolls_back_every_stage() {
    let (app, system) = setup().await;

    // BOOKS has 5 in stock, so 6 passes validation and payment but not
    // inventory.
    let (status, created) = post_order(&app, order_body("BOOKS", 4.0, 6)).await;
    assert_eq!(status, StatusCode::CREATED);

    let order_id = order_id_of(&created);
    let ending = wait_for_ending(&system, order_id).await;
    let envelope = &ending.envelope;

    assert_eq!(envelope.status, Some(SagaStatus::Fail));
    assert_eq!(envelope.history.len(), 6);

    let sources: Vec<EventSource> = envelope.history.iter().map(|e| e.source).collect();
    assert_eq!(
        sources,
        vec![
            EventSource::ProductValidationService,
            EventSource::PaymentService,
            EventSource::InventoryService,
            EventSource::InventoryService,
            EventSource::PaymentService,
            EventSource::ProductValidationService,
        ]
    );
    assert_eq!(envelope.history[2].status, SagaStatus::RollbackPending);
    assert!(envelope.history[2].message.contains("Product is out of stock!"));
    assert_eq!(envelope.history[5].status, SagaStatus::Fail);

    // Every effect is undone.
    assert_eq!(stock_of(&system, "BOOKS").await, Some(5));

    let key = LedgerKey::from_envelope(envelope);
    let payment = system
        .payment_engine()
        .behavior()
        .ledger()
        .find(&key)
        .await
        .unwrap()
        .expect("payment attempt is recorded");
    assert_eq!(payment.status, PaymentStatus::Refund);

    let validation = system
        .validation_engine()
        .behavior()
        .ledger()
        .find(&key)
        .await
        .unwrap()
        .expect("validation attempt is recorded");
    assert!(!validation.success);
}

#[tokio::test]
async fn test_undersized_payment_fails_before_inventory() {
    let (app, system) = setup().await;

    let (status, created) = post_order(&app, order_body("COMIC_BOOKS", 0.05, 1)).await;
    assert_eq!(status, StatusCode::CREATED);

    let order_id = order_id_of(&created);
    let ending = wait_for_ending(&system, order_id).await;
    let envelope = &ending.envelope;

    assert_eq!(envelope.status, Some(SagaStatus::Fail));
    assert_eq!(envelope.history.len(), 4);
    assert_eq!(envelope.history[1].source, EventSource::PaymentService);
    assert_eq!(envelope.history[1].status, SagaStatus::RollbackPending);
    assert!(
        envelope.history[1]
            .message
            .contains("The minimum amount available is 0.1")
    );

    // Inventory never ran.
    assert_eq!(stock_of(&system, "COMIC_BOOKS").await, Some(10));
    let key = LedgerKey::from_envelope(envelope);
    let movements = system
        .inventory_engine()
        .behavior()
        .ledger()
        .find(&key)
        .await
        .unwrap();
    assert!(movements.is_none());

    // The rejected charge still left a refunded trace.
    let payment = system
        .payment_engine()
        .behavior()
        .ledger()
        .find(&key)
        .await
        .unwrap()
        .expect("payment attempt is recorded");
    assert_eq!(payment.status, PaymentStatus::Refund);
    assert_eq!(payment.total_amount, 0.05);
}

#[tokio::test]
async fn test_unknown_product_fails_validation_only() {
    let (app, system) = setup().await;

    let (status, created) = post_order(&app, order_body("GADGETS", 15.0, 1)).await;
    assert_eq!(status, StatusCode::CREATED);

    let order_id = order_id_of(&created);
    let ending = wait_for_ending(&system, order_id).await;
    let envelope = &ending.envelope;

    assert_eq!(envelope.status, Some(SagaStatus::Fail));
    assert_eq!(envelope.history.len(), 2);
    assert!(
        envelope.history[0]
            .message
            .contains("Product code GADGETS does not exist in the catalog!")
    );
    assert_eq!(
        envelope.history[1].message,
        "Rollback executed on product validation!"
    );
}

#[tokio::test]
async fn test_empty_order_is_rejected_before_the_saga_starts() {
    let (app, system) = setup().await;

    let (status, body) = post_order(&app, r#"{"products": []}"#.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Products list is empty!");

    // Nothing was logged or published.
    let events = system.order_service().find_all_events().await.unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_event_queries() {
    let (app, system) = setup().await;

    let (_, created) = post_order(&app, order_body("COMIC_BOOKS", 10.0, 1)).await;
    let order_id = order_id_of(&created);
    let transaction_id = created["transactionId"].as_str().unwrap().to_string();
    wait_for_ending(&system, order_id).await;

    let (status, events) = get_json(&app, "/events").await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0]["createdAt"].as_str().is_some());

    let (status, event) = get_json(&app, &format!("/events/find?orderId={order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["orderId"].as_str().unwrap(), order_id.to_string());

    let (status, event) =
        get_json(&app, &format!("/events/find?transactionId={transaction_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["transactionId"].as_str().unwrap(), transaction_id);

    let (status, body) = get_json(&app, "/events/find").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "OrderID or TransactionID must be informed");

    let missing = uuid::Uuid::new_v4();
    let (status, _) = get_json(&app, &format!("/events/find?orderId={missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_lookup_errors() {
    let (app, _system) = setup().await;

    let (status, _) = get_json(&app, "/orders/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = get_json(&app, &format!("/orders/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_check() {
    let (app, _system) = setup().await;

    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_exposition() {
    let (app, system) = setup().await;

    let (_, created) = post_order(&app, order_body("COMIC_BOOKS", 10.0, 1)).await;
    wait_for_ending(&system, order_id_of(&created)).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("saga_completed_total"));
    assert!(text.contains("orders_created_total"));
}
