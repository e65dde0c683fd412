//! Shared application state.

use std::sync::Arc;

use commerce::MemoryServices;
use commerce::fulfillment::{CreateShipment, Fulfillment, create_shipment};
use commerce::payment::{AccountHolder, CreateAccountHolder, create_payment_account_holder};
use commerce::pricing::{RemovePriceListProductPrices, remove_price_list_product_prices};
use commerce::product::{
    CreateProduct, Product, UpdateProduct, create_products, remove_products, update_products,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use workflow::{
    Container, DefinitionError, ExecutionJournal, RunResult, Workflow, WorkflowEngine,
    WorkflowFailure,
};

use crate::flags::FlagRouter;

/// The workflows served by the API, built once at startup.
pub struct Workflows {
    pub remove_price_list_product_prices: Workflow<RemovePriceListProductPrices, Vec<String>>,
    pub create_payment_account_holder: Workflow<CreateAccountHolder, AccountHolder>,
    pub create_shipment: Workflow<CreateShipment, Fulfillment>,
    pub create_products: Workflow<Vec<CreateProduct>, Vec<Product>>,
    pub update_products: Workflow<Vec<UpdateProduct>, Vec<Product>>,
    pub remove_products: Workflow<Vec<String>, Vec<String>>,
}

impl Workflows {
    pub fn new() -> Result<Self, DefinitionError> {
        Ok(Self {
            remove_price_list_product_prices: remove_price_list_product_prices()?,
            create_payment_account_holder: create_payment_account_holder()?,
            create_shipment: create_shipment()?,
            create_products: create_products()?,
            update_products: update_products()?,
            remove_products: remove_products()?,
        })
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub services: MemoryServices,
    /// Application-wide services; each request works on a child scope.
    pub container: Arc<Container>,
    pub engine: WorkflowEngine,
    pub journal: Arc<dyn ExecutionJournal>,
    pub flags: FlagRouter,
    pub workflows: Workflows,
}

impl AppState {
    pub fn new(
        services: MemoryServices,
        journal: Arc<dyn ExecutionJournal>,
        flags: FlagRouter,
    ) -> Result<Self, DefinitionError> {
        Ok(Self {
            container: Arc::new(services.container()),
            engine: WorkflowEngine::with_journal(journal.clone()),
            journal,
            flags,
            workflows: Workflows::new()?,
            services,
        })
    }

    /// A request-scoped container.
    pub fn scope(&self) -> Arc<Container> {
        Arc::new(self.container.scope())
    }

    /// Runs `workflow` in a transaction of the commerce database, committed
    /// when the run succeeds.
    pub async fn run<I, O>(
        &self,
        workflow: &Workflow<I, O>,
        input: I,
    ) -> Result<RunResult<O>, WorkflowFailure>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        self.engine
            .run_in_transaction(workflow, input, self.scope(), &self.services.database)
            .await
    }
}
