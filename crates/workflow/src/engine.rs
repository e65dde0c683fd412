//! Execution engine.
//!
//! Runs a workflow's nodes strictly in definition order and, when a node
//! fails, compensates every completed step in reverse completion order. The
//! sweep always runs to the end: a failing compensation is recorded and the
//! next one is attempted.

use std::sync::Arc;
use std::time::Instant;

use common::RunId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::container::ServiceResolver;
use crate::context::{ExecutionContext, RunOptions};
use crate::erased::InvokeError;
use crate::error::{
    CompensationError, CompensationOutcome, FailureCause, ResolutionError, StepError,
    TransformError, WorkflowFailure,
};
use crate::events::WorkflowEvent;
use crate::journal::{ExecutionJournal, ExecutionJournalExt, JournalEntry};
use crate::record::{CompletedStep, ExecutionRecord};
use crate::state::RunState;
use crate::transaction::UnitOfWork;
use crate::transform::WorkflowData;
use crate::workflow::{Definition, Node, Workflow};

/// A successful run.
#[derive(Debug, Clone)]
pub struct RunResult<O> {
    pub run_id: RunId,
    pub output: O,
    /// Completed steps of the run, needed to roll it back later.
    pub record: ExecutionRecord,
}

/// Runs workflows.
///
/// The engine keeps no per-run state, so one engine can serve any number of
/// concurrent runs.
#[derive(Clone, Default)]
pub struct WorkflowEngine {
    journal: Option<Arc<dyn ExecutionJournal>>,
}

impl WorkflowEngine {
    /// Creates an engine that does not journal runs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine appending every run event to `journal`.
    pub fn with_journal(journal: Arc<dyn ExecutionJournal>) -> Self {
        Self {
            journal: Some(journal),
        }
    }

    pub fn journal(&self) -> Option<&Arc<dyn ExecutionJournal>> {
        self.journal.as_ref()
    }

    /// Runs a workflow.
    ///
    /// Steps see `options.transaction` but the engine never commits or rolls
    /// it back.
    pub async fn run<I, O>(
        &self,
        workflow: &Workflow<I, O>,
        input: I,
        options: impl Into<RunOptions>,
    ) -> Result<RunResult<O>, WorkflowFailure>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        let options = options.into();
        let run_id = RunId::new();
        let ctx = ExecutionContext::new(run_id, workflow.id(), options.container)
            .with_transaction(options.transaction)
            .with_journal(self.journal.clone());

        let input = serde_json::to_value(input)
            .map_err(|e| TransformError::new(format!("input is not serializable: {e}")));

        let (output, record) = execute(workflow.definition(), input, &ctx, |value| {
            serde_json::from_value::<O>(value)
                .map_err(|e| TransformError::new(format!("result has unexpected shape: {e}")))
        })
        .await?;

        Ok(RunResult {
            run_id,
            output,
            record,
        })
    }

    /// Runs a workflow inside a transaction opened on `unit_of_work`.
    ///
    /// The transaction is committed when the run succeeds and rolled back
    /// after the compensation sweep when it fails. A failed commit is
    /// reported as a [`FailureCause::Transaction`] after rolling back.
    #[tracing::instrument(skip_all, fields(workflow_id = %workflow.id()))]
    pub async fn run_in_transaction<I, O, U>(
        &self,
        workflow: &Workflow<I, O>,
        input: I,
        container: Arc<dyn ServiceResolver>,
        unit_of_work: &U,
    ) -> Result<RunResult<O>, WorkflowFailure>
    where
        I: Serialize,
        O: DeserializeOwned,
        U: UnitOfWork + ?Sized,
    {
        let tx = unit_of_work.begin().await.map_err(|err| WorkflowFailure {
            workflow_id: workflow.id().to_string(),
            run_id: RunId::new(),
            cause: FailureCause::Transaction(err),
            compensations: Vec::new(),
        })?;

        let options = RunOptions::new(container).with_transaction(tx.clone());
        match self.run(workflow, input, options).await {
            Ok(result) => match tx.commit().await {
                Ok(()) => Ok(result),
                Err(err) => {
                    tracing::warn!(run_id = %result.run_id, error = %err, "Commit failed");
                    if tx.is_active()
                        && let Err(rollback_err) = tx.rollback().await
                    {
                        tracing::warn!(run_id = %result.run_id, error = %rollback_err, "Rollback failed");
                    }
                    Err(WorkflowFailure {
                        workflow_id: workflow.id().to_string(),
                        run_id: result.run_id,
                        cause: FailureCause::Transaction(err),
                        compensations: Vec::new(),
                    })
                }
            },
            Err(failure) => {
                if let Err(err) = tx.rollback().await {
                    tracing::warn!(run_id = %failure.run_id, error = %err, "Rollback failed");
                }
                Err(failure)
            }
        }
    }

    /// Rolls back a run that already succeeded.
    ///
    /// Every step of `record` is compensated in reverse completion order,
    /// exactly as if a node after the last one had failed.
    pub async fn rollback<I, O>(
        &self,
        workflow: &Workflow<I, O>,
        record: &ExecutionRecord,
        options: impl Into<RunOptions>,
    ) -> Vec<CompensationOutcome> {
        let options = options.into();
        let ctx = ExecutionContext::new(record.run_id, workflow.id(), options.container)
            .with_transaction(options.transaction)
            .with_journal(self.journal.clone());

        if record.workflow_id != workflow.id() {
            tracing::warn!(
                run_id = %record.run_id,
                recorded = %record.workflow_id,
                workflow_id = %workflow.id(),
                "Rolling back a record of another workflow"
            );
        }

        rollback_record(workflow.definition(), record, &ctx, "rollback requested").await
    }
}

/// Runs `def` to completion. `decode` turns the result alias into the
/// caller's output type; a decode error triggers the compensation sweep.
#[tracing::instrument(
    name = "workflow_run",
    skip_all,
    fields(workflow_id = %def.id, run_id = %ctx.run_id())
)]
pub(crate) async fn execute<T, F>(
    def: &Definition,
    input: Result<Value, TransformError>,
    ctx: &ExecutionContext,
    decode: F,
) -> Result<(T, ExecutionRecord), WorkflowFailure>
where
    F: FnOnce(Value) -> Result<T, TransformError>,
{
    metrics::counter!("workflow_runs_total", "workflow" => def.id.clone()).increment(1);
    let mut driver = RunDriver::new(def, ctx);

    if let Err(err) = preflight(def, ctx.resolver().as_ref()) {
        return Err(driver.reject(FailureCause::Resolution(err)).await);
    }
    let input = match input {
        Ok(input) => input,
        Err(err) => {
            return Err(driver
                .reject(FailureCause::Transform(err.at(crate::INPUT_ALIAS)))
                .await);
        }
    };

    driver.start(input).await;
    for (index, node) in def.nodes.iter().enumerate() {
        if let Err(cause) = driver.run_node(index, node).await {
            return Err(driver.unwind(cause).await);
        }
    }

    let result = driver
        .data
        .get_value(&def.result_alias)
        .cloned()
        .ok_or_else(|| TransformError::new("result alias is not bound"))
        .and_then(decode);
    match result {
        Ok(output) => {
            let record = driver.succeed().await;
            Ok((output, record))
        }
        Err(err) => Err(driver
            .unwind(FailureCause::Transform(err.at(&def.result_alias)))
            .await),
    }
}

/// Compensates every step of `record` under the record's run id, journaling
/// the sweep as a continuation of that run.
pub(crate) async fn rollback_record(
    def: &Definition,
    record: &ExecutionRecord,
    ctx: &ExecutionContext,
    reason: impl Into<String>,
) -> Vec<CompensationOutcome> {
    let reason = reason.into();
    let mut journal = Journaler::resume(ctx.journal().cloned(), record.run_id, &def.id).await;

    tracing::info!(
        run_id = %record.run_id,
        workflow_id = %def.id,
        steps = record.len(),
        %reason,
        "Rolling back workflow run"
    );
    journal
        .record(WorkflowEvent::compensation_started(reason.clone()))
        .await;
    let outcomes = compensate(def, record, ctx, &mut journal).await;
    journal
        .record(WorkflowEvent::run_failed(format!("rolled back: {reason}")))
        .await;

    outcomes
}

/// Checks that every declared service resolves with its declared type.
fn preflight(def: &Definition, resolver: &dyn ServiceResolver) -> Result<(), ResolutionError> {
    def.requirements()
        .iter()
        .try_for_each(|requirement| requirement.check(resolver))
}

/// The reverse sweep.
async fn compensate(
    def: &Definition,
    record: &ExecutionRecord,
    ctx: &ExecutionContext,
    journal: &mut Journaler,
) -> Vec<CompensationOutcome> {
    let mut outcomes = Vec::with_capacity(record.len());

    for completed in record.unwind_order() {
        let result = match def.nodes.get(completed.index) {
            Some(Node::Step { step, .. }) if step.name() == completed.step => {
                step.compensate_erased(completed.compensate_with.clone(), ctx)
                    .await
            }
            _ => Err(StepError::Invalid(format!(
                "node {} of workflow '{}' is not step '{}'",
                completed.index, def.id, completed.step
            ))),
        };

        match result {
            Ok(()) => {
                tracing::info!(step = %completed.step, "Step compensated");
                journal
                    .record(WorkflowEvent::step_compensated(
                        &completed.step,
                        &completed.alias,
                    ))
                    .await;
                outcomes.push(CompensationOutcome::Compensated {
                    step: completed.step.clone(),
                });
            }
            Err(source) => {
                metrics::counter!(
                    "workflow_compensation_failures_total",
                    "workflow" => def.id.clone()
                )
                .increment(1);
                tracing::warn!(
                    step = %completed.step,
                    error = %source,
                    "Compensation failed, continuing with remaining steps"
                );
                journal
                    .record(WorkflowEvent::compensation_failed(
                        &completed.step,
                        source.to_string(),
                    ))
                    .await;
                outcomes.push(CompensationOutcome::Failed(CompensationError {
                    step: completed.step.clone(),
                    source,
                }));
            }
        }
    }

    outcomes
}

/// Mutable state of one run.
struct RunDriver<'a> {
    def: &'a Definition,
    ctx: &'a ExecutionContext,
    state: RunState,
    record: ExecutionRecord,
    data: WorkflowData,
    journal: Journaler,
    started: Instant,
}

impl<'a> RunDriver<'a> {
    fn new(def: &'a Definition, ctx: &'a ExecutionContext) -> Self {
        Self {
            def,
            ctx,
            state: RunState::Pending,
            record: ExecutionRecord::new(ctx.run_id(), &def.id),
            data: WorkflowData::default(),
            journal: Journaler::new(ctx.journal().cloned(), ctx.run_id(), &def.id),
            started: Instant::now(),
        }
    }

    async fn start(&mut self, input: Value) {
        debug_assert!(self.state.can_run());
        self.state = RunState::Running;
        self.data = WorkflowData::with_input(input);
        tracing::info!(nodes = self.def.nodes.len(), "Workflow run started");
        self.journal
            .record(WorkflowEvent::run_started(self.ctx.run_id(), &self.def.id))
            .await;
    }

    async fn run_node(&mut self, index: usize, node: &Node) -> Result<(), FailureCause> {
        match node {
            Node::Step {
                alias,
                input_from,
                step,
            } => {
                let name = step.name();
                let input = self.data.get_value(input_from).cloned().ok_or_else(|| {
                    FailureCause::Transform(
                        TransformError::new(format!("alias '{input_from}' is not bound"))
                            .at(alias),
                    )
                })?;

                tracing::debug!(step = %name, %alias, "Step started");
                self.journal
                    .record(WorkflowEvent::step_started(name, alias))
                    .await;

                match step.invoke_erased(input, self.ctx).await {
                    Ok(invoked) => {
                        self.complete(index, name, alias, invoked.compensate_with)
                            .await;
                        self.data.insert(alias, invoked.output);
                        Ok(())
                    }
                    Err(InvokeError::Step(error)) => {
                        self.journal
                            .record(WorkflowEvent::step_failed(name, error.to_string()))
                            .await;
                        Err(FailureCause::Step {
                            step: name.to_string(),
                            error,
                        })
                    }
                    Err(InvokeError::Decode(e)) => {
                        let err = TransformError::new(format!(
                            "input of step '{name}' has unexpected shape: {e}"
                        ))
                        .at(alias);
                        self.journal
                            .record(WorkflowEvent::step_failed(name, err.to_string()))
                            .await;
                        Err(FailureCause::Transform(err))
                    }
                    Err(InvokeError::Encode {
                        source,
                        compensate_with,
                    }) => {
                        // The forward action did run, so it is compensated.
                        self.complete(index, name, alias, compensate_with).await;
                        let err = TransformError::new(format!(
                            "output of step '{name}' is not serializable: {source}"
                        ))
                        .at(alias);
                        self.journal
                            .record(WorkflowEvent::step_failed(name, err.to_string()))
                            .await;
                        Err(FailureCause::Transform(err))
                    }
                }
            }
            Node::Transform(transform) => match transform.apply(&self.data) {
                Ok(value) => {
                    self.journal
                        .record(WorkflowEvent::transform_applied(&transform.alias))
                        .await;
                    self.data.insert(&transform.alias, value);
                    Ok(())
                }
                Err(err) => {
                    self.journal
                        .record(WorkflowEvent::transform_failed(
                            &transform.alias,
                            err.reason.clone(),
                        ))
                        .await;
                    Err(FailureCause::Transform(err))
                }
            },
        }
    }

    async fn complete(
        &mut self,
        index: usize,
        name: &str,
        alias: &str,
        compensate_with: Option<Value>,
    ) {
        tracing::debug!(step = %name, %alias, "Step completed");
        let completed = CompletedStep {
            index,
            step: name.to_string(),
            alias: alias.to_string(),
            compensate_with,
        };
        self.journal
            .record(WorkflowEvent::StepCompleted(completed.clone()))
            .await;
        self.record.push(completed);
    }

    async fn succeed(mut self) -> ExecutionRecord {
        self.state = RunState::Succeeded;
        self.journal.record(WorkflowEvent::run_succeeded()).await;

        let duration = self.started.elapsed().as_secs_f64();
        metrics::histogram!("workflow_run_duration_seconds", "workflow" => self.def.id.clone())
            .record(duration);
        metrics::counter!("workflow_runs_succeeded", "workflow" => self.def.id.clone())
            .increment(1);
        tracing::info!(duration, steps = self.record.len(), "Workflow run succeeded");

        self.record
    }

    /// Fails a run before any node executed.
    async fn reject(mut self, cause: FailureCause) -> WorkflowFailure {
        debug_assert!(self.state.can_run());
        self.journal
            .record(WorkflowEvent::run_started(self.ctx.run_id(), &self.def.id))
            .await;
        self.fail(cause, Vec::new()).await
    }

    async fn unwind(mut self, cause: FailureCause) -> WorkflowFailure {
        debug_assert!(self.state.can_compensate());
        self.state = RunState::Compensating;
        tracing::warn!(
            error = %cause,
            completed = self.record.len(),
            "Workflow node failed, compensating completed steps"
        );
        self.journal
            .record(WorkflowEvent::compensation_started(cause.to_string()))
            .await;

        let outcomes = compensate(self.def, &self.record, self.ctx, &mut self.journal).await;
        self.fail(cause, outcomes).await
    }

    async fn fail(
        mut self,
        cause: FailureCause,
        compensations: Vec<CompensationOutcome>,
    ) -> WorkflowFailure {
        self.state = RunState::Failed;
        self.journal
            .record(WorkflowEvent::run_failed(cause.to_string()))
            .await;

        let duration = self.started.elapsed().as_secs_f64();
        metrics::histogram!("workflow_run_duration_seconds", "workflow" => self.def.id.clone())
            .record(duration);
        metrics::counter!("workflow_runs_failed", "workflow" => self.def.id.clone()).increment(1);
        tracing::warn!(
            duration,
            reason = %cause,
            compensated = compensations.len(),
            "Workflow run failed"
        );

        WorkflowFailure {
            workflow_id: self.def.id.clone(),
            run_id: self.ctx.run_id(),
            cause,
            compensations,
        }
    }
}

/// Appends a run's events to the configured journal, if any.
///
/// Journal failures are logged and otherwise ignored: the journal observes
/// runs, it never decides their outcome.
struct Journaler {
    journal: Option<Arc<dyn ExecutionJournal>>,
    run_id: RunId,
    workflow_id: String,
    sequence: u64,
}

impl Journaler {
    fn new(journal: Option<Arc<dyn ExecutionJournal>>, run_id: RunId, workflow_id: &str) -> Self {
        Self {
            journal,
            run_id,
            workflow_id: workflow_id.to_string(),
            sequence: 0,
        }
    }

    /// Continues the journal of an existing run.
    async fn resume(
        journal: Option<Arc<dyn ExecutionJournal>>,
        run_id: RunId,
        workflow_id: &str,
    ) -> Self {
        let mut journaler = Self::new(journal, run_id, workflow_id);
        if let Some(journal) = &journaler.journal {
            match journal.last_sequence(run_id).await {
                Ok(sequence) => journaler.sequence = sequence,
                Err(err) => {
                    tracing::warn!(%run_id, error = %err, "Failed to read journal sequence");
                }
            }
        }
        journaler
    }

    async fn record(&mut self, event: WorkflowEvent) {
        let Some(journal) = &self.journal else {
            return;
        };

        let sequence = self.sequence + 1;
        let entry = match JournalEntry::new(self.run_id, &self.workflow_id, sequence, &event) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(
                    run_id = %self.run_id,
                    event_type = event.event_type(),
                    error = %err,
                    "Failed to encode journal entry"
                );
                return;
            }
        };

        match journal.append(entry).await {
            Ok(()) => self.sequence = sequence,
            Err(err) => {
                tracing::warn!(
                    run_id = %self.run_id,
                    event_type = event.event_type(),
                    error = %err,
                    "Failed to journal workflow event"
                );
            }
        }
    }
}
