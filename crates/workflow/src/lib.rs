//! Workflow orchestration engine.
//!
//! A business operation is expressed as an ordered list of nodes: steps,
//! which perform a forward action and know how to undo it, and transforms,
//! which reshape data between steps. The engine runs the nodes strictly in
//! definition order. If a step fails, every previously completed step is
//! compensated in reverse order and the original failure is reported with the
//! outcome of each compensation attached.
//!
//! Steps receive an [`ExecutionContext`] giving them access to a
//! [`ServiceResolver`] and, when the caller opened one, a
//! [`TransactionHandle`]. The engine never commits or rolls back a caller's
//! transaction; [`WorkflowEngine::run_in_transaction`] is the explicit host
//! wrapper that does.

pub mod container;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod journal;
pub mod record;
pub mod state;
pub mod step;
pub mod summary;
pub mod transaction;
pub mod transform;
pub mod workflow;

mod erased;

pub use container::{Container, ServiceRequirement, ServiceResolver, ServiceResolverExt};
pub use context::{ExecutionContext, RunOptions};
pub use engine::{RunResult, WorkflowEngine};
pub use error::{
    CompensationError, CompensationOutcome, DefinitionError, FailureCause, FailureKind,
    JournalError, ResolutionError, StepError, TransactionError, TransformError, WorkflowFailure,
};
pub use events::WorkflowEvent;
pub use journal::{ExecutionJournal, ExecutionJournalExt, InMemoryJournal, JournalEntry};
pub use record::{CompletedStep, ExecutionRecord};
pub use state::RunState;
pub use step::{FnStep, Step, StepResponse};
pub use summary::RunSummary;
pub use transaction::{
    TransactionHandle, TransactionId, TransactionScope, UnitOfWork, within_transaction,
};
pub use transform::{INPUT_ALIAS, WorkflowData};
pub use workflow::{Workflow, WorkflowBuilder, WorkflowStep};
