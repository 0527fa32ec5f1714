//! Runtime wiring: broker, participants, orchestrator and worker loops.

use std::future::Future;
use std::sync::Arc;

use messaging::{InMemoryBroker, MessageBus, SagaEnvelope, Subscription, Topic};
use orchestrator::{Orchestrator, StagePipeline};
use order::{OrderService, OrderStore, SagaLog};
use participant::{
    InMemoryInventoryLevels, InMemoryLedger, InMemoryProductCatalog, InventoryLevelStore,
    InventoryMovement, InventoryStage, PaymentRecord, PaymentStage, ProductValidationStage,
    StageEngine, ValidationRecord,
};

use crate::routes::orders::AppState;

pub type ValidationEngine = StageEngine<
    ProductValidationStage<InMemoryLedger<ValidationRecord>, InMemoryProductCatalog>,
    InMemoryBroker,
>;
pub type PaymentEngine = StageEngine<PaymentStage<InMemoryLedger<PaymentRecord>>, InMemoryBroker>;
pub type InventoryEngine = StageEngine<
    InventoryStage<InMemoryLedger<Vec<InventoryMovement>>, InMemoryInventoryLevels>,
    InMemoryBroker,
>;

/// Every long-lived piece of the saga system, wired over one in-process
/// broker.
///
/// Dropping the system after [`SagaSystem::start_workers`] is safe: the
/// worker tasks and the HTTP state hold their own handles on everything
/// they use.
pub struct SagaSystem<O: OrderStore, L: SagaLog> {
    broker: InMemoryBroker,
    catalog: InMemoryProductCatalog,
    inventory_levels: InMemoryInventoryLevels,
    validation: Arc<ValidationEngine>,
    payment: Arc<PaymentEngine>,
    inventory: Arc<InventoryEngine>,
    orchestrator: Arc<Orchestrator<InMemoryBroker>>,
    order_service: Arc<OrderService<InMemoryBroker, O, L>>,
}

impl<O, L> SagaSystem<O, L>
where
    O: OrderStore + 'static,
    L: SagaLog + 'static,
{
    /// Wires the stages, the orchestrator and the order service over a
    /// fresh broker, using the given stores for the order side.
    pub fn new(orders: O, saga_log: L) -> orchestrator::Result<Self> {
        let broker = InMemoryBroker::new();
        let catalog = InMemoryProductCatalog::new();
        let inventory_levels = InMemoryInventoryLevels::new();

        let validation = Arc::new(StageEngine::new(
            ProductValidationStage::new(InMemoryLedger::new(), catalog.clone()),
            broker.clone(),
        ));
        let payment = Arc::new(StageEngine::new(
            PaymentStage::new(InMemoryLedger::new()),
            broker.clone(),
        ));
        let inventory = Arc::new(StageEngine::new(
            InventoryStage::new(InMemoryLedger::new(), inventory_levels.clone()),
            broker.clone(),
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            &StagePipeline::standard(),
            broker.clone(),
        )?);
        let order_service = Arc::new(OrderService::new(broker.clone(), orders, saga_log));

        Ok(Self {
            broker,
            catalog,
            inventory_levels,
            validation,
            payment,
            inventory,
            orchestrator,
            order_service,
        })
    }

    /// Seeds the demo catalog and stock levels.
    pub async fn seed_demo_data(&self) -> participant::Result<()> {
        self.catalog.add("COMIC_BOOKS");
        self.catalog.add("BOOKS");
        self.inventory_levels.set_available("COMIC_BOOKS", 10).await?;
        self.inventory_levels.set_available("BOOKS", 5).await?;
        tracing::info!("demo catalog and stock levels seeded");
        Ok(())
    }

    /// Subscribes every worker to its topic and spawns the worker loops.
    ///
    /// All subscriptions are taken before any loop starts, so an envelope
    /// published right after this returns cannot be lost to a late
    /// subscriber.
    pub async fn start_workers(&self) -> messaging::Result<()> {
        let start = self.broker.subscribe(Topic::StartSaga).await?;
        let reports = self.broker.subscribe(Topic::Orchestrator).await?;
        let finish_success = self.broker.subscribe(Topic::FinishSuccess).await?;
        let finish_fail = self.broker.subscribe(Topic::FinishFail).await?;
        let validation_forward = self.broker.subscribe(Topic::ProductValidationSuccess).await?;
        let validation_rollback = self.broker.subscribe(Topic::ProductValidationFail).await?;
        let payment_forward = self.broker.subscribe(Topic::PaymentSuccess).await?;
        let payment_rollback = self.broker.subscribe(Topic::PaymentFail).await?;
        let inventory_forward = self.broker.subscribe(Topic::InventorySuccess).await?;
        let inventory_rollback = self.broker.subscribe(Topic::InventoryFail).await?;
        let endings = self.broker.subscribe(Topic::NotifyEnding).await?;

        let orchestrator = Arc::clone(&self.orchestrator);
        spawn_worker(start, move |envelope| {
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.start_saga(envelope).await }
        });

        let orchestrator = Arc::clone(&self.orchestrator);
        spawn_worker(reports, move |envelope| {
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.continue_saga(envelope).await }
        });

        let orchestrator = Arc::clone(&self.orchestrator);
        spawn_worker(finish_success, move |envelope| {
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.finish_saga_success(envelope).await }
        });

        let orchestrator = Arc::clone(&self.orchestrator);
        spawn_worker(finish_fail, move |envelope| {
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.finish_saga_fail(envelope).await }
        });

        let validation = Arc::clone(&self.validation);
        spawn_worker(validation_forward, move |envelope| {
            let validation = Arc::clone(&validation);
            async move { validation.run_forward(envelope).await }
        });

        let validation = Arc::clone(&self.validation);
        spawn_worker(validation_rollback, move |envelope| {
            let validation = Arc::clone(&validation);
            async move { validation.run_compensation(envelope).await }
        });

        let payment = Arc::clone(&self.payment);
        spawn_worker(payment_forward, move |envelope| {
            let payment = Arc::clone(&payment);
            async move { payment.run_forward(envelope).await }
        });

        let payment = Arc::clone(&self.payment);
        spawn_worker(payment_rollback, move |envelope| {
            let payment = Arc::clone(&payment);
            async move { payment.run_compensation(envelope).await }
        });

        let inventory = Arc::clone(&self.inventory);
        spawn_worker(inventory_forward, move |envelope| {
            let inventory = Arc::clone(&inventory);
            async move { inventory.run_forward(envelope).await }
        });

        let inventory = Arc::clone(&self.inventory);
        spawn_worker(inventory_rollback, move |envelope| {
            let inventory = Arc::clone(&inventory);
            async move { inventory.run_compensation(envelope).await }
        });

        let order_service = Arc::clone(&self.order_service);
        spawn_worker(endings, move |envelope| {
            let order_service = Arc::clone(&order_service);
            async move { order_service.record_ending(&envelope).await }
        });

        tracing::info!("saga workers started");
        Ok(())
    }

    /// State handed to the HTTP handlers.
    pub fn app_state(&self) -> Arc<AppState<O, L>> {
        Arc::new(AppState {
            order_service: Arc::clone(&self.order_service),
        })
    }

    pub fn order_service(&self) -> &OrderService<InMemoryBroker, O, L> {
        &self.order_service
    }

    pub fn catalog(&self) -> &InMemoryProductCatalog {
        &self.catalog
    }

    pub fn inventory_levels(&self) -> &InMemoryInventoryLevels {
        &self.inventory_levels
    }

    pub fn validation_engine(&self) -> &ValidationEngine {
        &self.validation
    }

    pub fn payment_engine(&self) -> &PaymentEngine {
        &self.payment
    }

    pub fn inventory_engine(&self) -> &InventoryEngine {
        &self.inventory
    }
}

/// Consumes one subscription until the broker closes.
///
/// Handler errors and undecodable messages are logged and skipped; a worker
/// never dies because one envelope was bad.
fn spawn_worker<F, Fut, E>(mut subscription: Subscription, handler: F)
where
    F: Fn(SagaEnvelope) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
    E: std::fmt::Display,
{
    tokio::spawn(async move {
        let topic = subscription.topic();
        while let Some(message) = subscription.recv().await {
            match message {
                Ok(envelope) => {
                    if let Err(error) = handler(envelope).await {
                        tracing::error!(%topic, %error, "failed to handle envelope");
                    }
                }
                Err(error) => {
                    tracing::warn!(%topic, %error, "discarding undecodable message");
                }
            }
        }
        tracing::debug!(%topic, "subscription closed, worker stopping");
    });
}
