//! Per-run execution context handed to every step.

use std::sync::Arc;

use common::RunId;

use crate::container::{Container, ServiceResolver, ServiceResolverExt};
use crate::error::ResolutionError;
use crate::journal::ExecutionJournal;
use crate::transaction::TransactionHandle;

/// What a step can see of the run it belongs to.
#[derive(Clone)]
pub struct ExecutionContext {
    run_id: RunId,
    workflow_id: String,
    resolver: Arc<dyn ServiceResolver>,
    transaction: Option<TransactionHandle>,
    journal: Option<Arc<dyn ExecutionJournal>>,
}

impl ExecutionContext {
    pub fn new(
        run_id: RunId,
        workflow_id: impl Into<String>,
        resolver: Arc<dyn ServiceResolver>,
    ) -> Self {
        Self {
            run_id,
            workflow_id: workflow_id.into(),
            resolver,
            transaction: None,
            journal: None,
        }
    }

    pub fn with_transaction(mut self, transaction: Option<TransactionHandle>) -> Self {
        self.transaction = transaction;
        self
    }

    pub(crate) fn with_journal(mut self, journal: Option<Arc<dyn ExecutionJournal>>) -> Self {
        self.journal = journal;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn resolver(&self) -> &Arc<dyn ServiceResolver> {
        &self.resolver
    }

    /// The caller's transaction, if one was supplied.
    pub fn transaction(&self) -> Option<&TransactionHandle> {
        self.transaction.as_ref()
    }

    pub(crate) fn journal(&self) -> Option<&Arc<dyn ExecutionJournal>> {
        self.journal.as_ref()
    }

    /// Resolves a service by key.
    pub fn resolve<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Result<T, ResolutionError> {
        self.resolver.resolve(key)
    }

    /// Context for a nested workflow: same resolver, transaction and journal,
    /// new run identity.
    pub(crate) fn nested(&self, run_id: RunId, workflow_id: &str) -> Self {
        Self {
            run_id,
            workflow_id: workflow_id.to_string(),
            resolver: Arc::clone(&self.resolver),
            transaction: self.transaction.clone(),
            journal: self.journal.clone(),
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("run_id", &self.run_id)
            .field("workflow_id", &self.workflow_id)
            .field("transaction", &self.transaction)
            .finish_non_exhaustive()
    }
}

/// Options for a single run.
#[derive(Clone)]
pub struct RunOptions {
    pub container: Arc<dyn ServiceResolver>,
    pub transaction: Option<TransactionHandle>,
}

impl RunOptions {
    pub fn new(container: Arc<dyn ServiceResolver>) -> Self {
        Self {
            container,
            transaction: None,
        }
    }

    pub fn with_transaction(mut self, transaction: TransactionHandle) -> Self {
        self.transaction = Some(transaction);
        self
    }
}

impl From<Arc<Container>> for RunOptions {
    fn from(container: Arc<Container>) -> Self {
        Self::new(container)
    }
}

impl From<Container> for RunOptions {
    fn from(container: Container) -> Self {
        Self::new(Arc::new(container))
    }
}
