//! Workflow error types.

use common::RunId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transaction::TransactionId;

/// Coarse classification of a failure, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The input was rejected.
    Invalid,
    /// Something the operation refers to does not exist.
    NotFound,
    /// The operation conflicts with the current state of the data.
    Conflict,
    /// Anything else: service outages, programmer errors, storage failures.
    Unexpected,
}

/// Failure to look up a service in a resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Nothing is registered under the key.
    #[error("No service registered under key '{key}'")]
    Unknown { key: String },

    /// A service is registered under the key but has a different type.
    #[error("Service '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

impl ResolutionError {
    /// Returns the key that failed to resolve.
    pub fn key(&self) -> &str {
        match self {
            ResolutionError::Unknown { key } | ResolutionError::TypeMismatch { key, .. } => key,
        }
    }
}

/// Errors raised by a transaction boundary.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// A transaction could not be opened.
    #[error("Failed to begin transaction: {0}")]
    Begin(String),

    /// The commit was rejected by the underlying store.
    #[error("Failed to commit transaction {id}: {reason}")]
    Commit { id: TransactionId, reason: String },

    /// The rollback was rejected by the underlying store.
    #[error("Failed to roll back transaction {id}: {reason}")]
    Rollback { id: TransactionId, reason: String },

    /// The transaction was already committed or rolled back.
    #[error("Transaction {0} is no longer active")]
    Inactive(TransactionId),

    /// The handle was opened by a different store.
    #[error("Transaction {0} was not opened by this store")]
    Foreign(TransactionId),
}

/// Error returned by a step's forward or compensating action.
#[derive(Debug, Error)]
pub enum StepError {
    /// Input failed validation.
    #[error("Invalid data: {0}")]
    Invalid(String),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The action conflicts with the current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A collaborating service failed.
    #[error("Service error: {0}")]
    Service(String),

    /// A dependency could not be resolved at runtime.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The transaction handle could not be used.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Data could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A nested workflow failed. Its own completed steps were already
    /// compensated before this error was returned.
    #[error("Nested workflow failed: {0}")]
    Nested(Box<WorkflowFailure>),

    /// Rolling back a nested workflow left some of its steps uncompensated.
    #[error("{} compensation(s) of nested workflow '{workflow}' failed", failures.len())]
    NestedCompensation {
        workflow: String,
        failures: Vec<CompensationError>,
    },
}

impl StepError {
    /// Classifies the error.
    pub fn kind(&self) -> FailureKind {
        match self {
            StepError::Invalid(_) => FailureKind::Invalid,
            StepError::NotFound(_) => FailureKind::NotFound,
            StepError::Conflict(_) => FailureKind::Conflict,
            StepError::Nested(failure) => failure.kind(),
            StepError::Service(_)
            | StepError::Resolution(_)
            | StepError::Transaction(_)
            | StepError::Serialization(_)
            | StepError::NestedCompensation { .. } => FailureKind::Unexpected,
        }
    }
}

/// A transform, or the data plumbing around a step, failed.
///
/// These are programmer errors: the shape of the data flowing between nodes
/// does not match what a node expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Transform '{node}' failed: {reason}")]
pub struct TransformError {
    /// Alias of the node that failed. Empty until the engine attributes it.
    pub node: String,
    /// What went wrong.
    pub reason: String,
}

impl TransformError {
    /// Creates an error that the engine attributes to the running node.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            node: String::new(),
            reason: reason.into(),
        }
    }

    /// Attributes the error to a node, unless it is already attributed.
    pub fn at(mut self, node: &str) -> Self {
        if self.node.is_empty() {
            self.node = node.to_string();
        }
        self
    }

    pub(crate) fn panicked(node: &str, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self {
            node: node.to_string(),
            reason: format!("panicked: {message}"),
        }
    }
}

/// A compensating action failed.
#[derive(Debug, Error)]
#[error("Compensation for step '{step}' failed: {source}")]
pub struct CompensationError {
    /// Name of the step whose compensation failed.
    pub step: String,
    /// The error returned by the compensation.
    #[source]
    pub source: StepError,
}

/// Result of compensating one completed step during a sweep.
#[derive(Debug)]
pub enum CompensationOutcome {
    /// The compensation ran and returned success.
    Compensated { step: String },
    /// The compensation returned an error. The sweep continued regardless.
    Failed(CompensationError),
}

impl CompensationOutcome {
    /// Name of the compensated step.
    pub fn step(&self) -> &str {
        match self {
            CompensationOutcome::Compensated { step } => step,
            CompensationOutcome::Failed(err) => &err.step,
        }
    }

    /// Returns true if the compensation failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, CompensationOutcome::Failed(_))
    }
}

/// The reason a run failed.
#[derive(Debug, Error)]
pub enum FailureCause {
    /// A required service was missing; no step ran.
    #[error("Service resolution failed: {0}")]
    Resolution(ResolutionError),

    /// A step's forward action failed.
    #[error("Step '{step}' failed: {error}")]
    Step { step: String, error: StepError },

    /// A transform or the data flowing between nodes was malformed.
    #[error(transparent)]
    Transform(TransformError),

    /// The host wrapper could not open or commit its transaction.
    #[error("Transaction failed: {0}")]
    Transaction(TransactionError),
}

impl FailureCause {
    /// Classifies the cause.
    pub fn kind(&self) -> FailureKind {
        match self {
            FailureCause::Step { error, .. } => error.kind(),
            FailureCause::Resolution(_)
            | FailureCause::Transform(_)
            | FailureCause::Transaction(_) => FailureKind::Unexpected,
        }
    }

    /// Name of the failing step, if a step failed.
    pub fn step(&self) -> Option<&str> {
        match self {
            FailureCause::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// A run that failed, after its compensation sweep finished.
#[derive(Debug, Error)]
#[error("Workflow '{workflow_id}' failed: {cause}")]
pub struct WorkflowFailure {
    /// Identity of the workflow.
    pub workflow_id: String,
    /// The failed run.
    pub run_id: RunId,
    /// The original failure.
    #[source]
    pub cause: FailureCause,
    /// One entry per completed step, in the order compensations ran.
    pub compensations: Vec<CompensationOutcome>,
}

impl WorkflowFailure {
    /// Classifies the original failure.
    pub fn kind(&self) -> FailureKind {
        self.cause.kind()
    }

    /// Returns the compensations that failed.
    pub fn failed_compensations(&self) -> impl Iterator<Item = &CompensationError> {
        self.compensations.iter().filter_map(|outcome| match outcome {
            CompensationOutcome::Failed(err) => Some(err),
            CompensationOutcome::Compensated { .. } => None,
        })
    }

    /// Returns true if every completed step was compensated successfully.
    pub fn is_fully_compensated(&self) -> bool {
        !self.compensations.iter().any(CompensationOutcome::is_failed)
    }

    /// Names of the compensated steps, in sweep order.
    pub fn compensated_steps(&self) -> Vec<&str> {
        self.compensations.iter().map(|o| o.step()).collect()
    }
}

/// A workflow definition is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// The workflow has no nodes.
    #[error("Workflow '{0}' has no nodes")]
    Empty(String),

    /// Two nodes write to the same alias.
    #[error("Workflow '{workflow}' binds alias '{alias}' more than once")]
    DuplicateAlias { workflow: String, alias: String },

    /// A node tries to bind the reserved input alias.
    #[error("Workflow '{workflow}' rebinds the reserved alias 'input'")]
    ReservedAlias { workflow: String },

    /// A node reads an alias no earlier node defines.
    #[error("Node '{node}' of workflow '{workflow}' reads undefined alias '{alias}'")]
    UnknownAlias {
        workflow: String,
        node: String,
        alias: String,
    },

    /// The designated result alias is not defined.
    #[error("Workflow '{workflow}' returns undefined alias '{alias}'")]
    UnknownResult { workflow: String, alias: String },
}

/// Errors raised by an execution journal.
#[derive(Debug, Error)]
pub enum JournalError {
    /// An entry was appended out of sequence.
    #[error("Sequence conflict for run {run_id}: expected {expected}, got {actual}")]
    SequenceConflict {
        run_id: RunId,
        expected: u64,
        actual: u64,
    },

    /// An entry could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The storage backend failed.
    #[error("Journal backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_kinds() {
        assert_eq!(StepError::Invalid("x".into()).kind(), FailureKind::Invalid);
        assert_eq!(StepError::NotFound("x".into()).kind(), FailureKind::NotFound);
        assert_eq!(StepError::Conflict("x".into()).kind(), FailureKind::Conflict);
        assert_eq!(
            StepError::Service("x".into()).kind(),
            FailureKind::Unexpected
        );
        assert_eq!(
            StepError::from(ResolutionError::Unknown { key: "k".into() }).kind(),
            FailureKind::Unexpected
        );
    }

    #[test]
    fn nested_failure_keeps_inner_kind() {
        let inner = WorkflowFailure {
            workflow_id: "inner".into(),
            run_id: RunId::new(),
            cause: FailureCause::Step {
                step: "validate".into(),
                error: StepError::Conflict("already shipped".into()),
            },
            compensations: Vec::new(),
        };
        assert_eq!(
            StepError::Nested(Box::new(inner)).kind(),
            FailureKind::Conflict
        );
    }

    #[test]
    fn transform_error_attribution_is_sticky() {
        let err = TransformError::new("bad shape").at("first").at("second");
        assert_eq!(err.node, "first");
        assert_eq!(err.to_string(), "Transform 'first' failed: bad shape");
    }

    #[test]
    fn transform_error_from_panic_payload() {
        let err = TransformError::panicked("prepare", Box::new("boom"));
        assert_eq!(err.reason, "panicked: boom");

        let err = TransformError::panicked("prepare", Box::new(String::from("bang")));
        assert_eq!(err.reason, "panicked: bang");
    }

    #[test]
    fn failure_reports_failed_compensations() {
        let failure = WorkflowFailure {
            workflow_id: "wf".into(),
            run_id: RunId::new(),
            cause: FailureCause::Step {
                step: "charge".into(),
                error: StepError::Service("declined".into()),
            },
            compensations: vec![
                CompensationOutcome::Failed(CompensationError {
                    step: "b".into(),
                    source: StepError::Service("down".into()),
                }),
                CompensationOutcome::Compensated { step: "a".into() },
            ],
        };

        assert!(!failure.is_fully_compensated());
        assert_eq!(failure.failed_compensations().count(), 1);
        assert_eq!(failure.compensated_steps(), vec!["b", "a"]);
        assert_eq!(failure.cause.step(), Some("charge"));
        assert_eq!(
            failure.to_string(),
            "Workflow 'wf' failed: Step 'charge' failed: Service error: declined"
        );
    }

    #[test]
    fn resolution_error_key() {
        let err = ResolutionError::TypeMismatch {
            key: "payment".into(),
            expected: "u32",
        };
        assert_eq!(err.key(), "payment");
    }
}
