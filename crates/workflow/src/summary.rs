//! Run state rebuilt from journaled events.

use chrono::{DateTime, Utc};
use common::RunId;
use serde::{Deserialize, Serialize};

use crate::events::WorkflowEvent;
use crate::record::{CompletedStep, ExecutionRecord};
use crate::state::RunState;

/// What a journal knows about one run.
///
/// Built by replaying the run's events in sequence order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    run_id: Option<RunId>,
    workflow_id: String,
    state: RunState,
    completed: Vec<CompletedStep>,
    compensated: Vec<String>,
    compensation_failures: Vec<String>,
    failed_node: Option<String>,
    failure_reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Replays events in order.
    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = WorkflowEvent>,
    {
        let mut summary = Self::default();
        for event in events {
            summary.apply(event);
        }
        summary
    }

    pub fn apply(&mut self, event: WorkflowEvent) {
        match event {
            WorkflowEvent::RunStarted(data) => {
                self.run_id = Some(data.run_id);
                self.workflow_id = data.workflow_id;
                self.state = RunState::Running;
                self.started_at = Some(data.started_at);
            }
            WorkflowEvent::StepStarted(_) | WorkflowEvent::TransformApplied(_) => {}
            WorkflowEvent::StepCompleted(step) => {
                self.completed.push(step);
            }
            WorkflowEvent::StepFailed(data) | WorkflowEvent::TransformFailed(data) => {
                self.failed_node = Some(data.name);
                self.failure_reason = Some(data.error);
            }
            WorkflowEvent::CompensationStarted(_) => {
                self.state = RunState::Compensating;
            }
            WorkflowEvent::StepCompensated(data) => {
                self.compensated.push(data.name);
            }
            WorkflowEvent::CompensationFailed(data) => {
                self.compensation_failures.push(data.name);
            }
            WorkflowEvent::RunSucceeded(data) => {
                self.state = RunState::Succeeded;
                self.finished_at = Some(data.completed_at);
            }
            WorkflowEvent::RunFailed(data) => {
                self.state = RunState::Failed;
                self.failure_reason = Some(data.reason);
                self.finished_at = Some(data.failed_at);
            }
        }
    }
}

// Query methods
impl RunSummary {
    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Steps whose forward action succeeded, in completion order.
    pub fn completed_steps(&self) -> &[CompletedStep] {
        &self.completed
    }

    /// Steps compensated successfully, in sweep order.
    pub fn compensated_steps(&self) -> &[String] {
        &self.compensated
    }

    pub fn compensation_failures(&self) -> &[String] {
        &self.compensation_failures
    }

    /// The node whose failure triggered the sweep, if any.
    pub fn failed_node(&self) -> Option<&str> {
        self.failed_node.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// The run's execution record, available once the run started.
    pub fn record(&self) -> Option<ExecutionRecord> {
        self.run_id.map(|run_id| ExecutionRecord {
            run_id,
            workflow_id: self.workflow_id.clone(),
            completed: self.completed.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_summary() {
        let summary = RunSummary::default();
        assert!(summary.run_id().is_none());
        assert_eq!(summary.state(), RunState::Pending);
        assert!(summary.record().is_none());
    }

    #[test]
    fn test_replay_successful_run() {
        let run_id = RunId::new();
        let summary = RunSummary::from_events([
            WorkflowEvent::run_started(run_id, "create-shipment"),
            WorkflowEvent::step_started("validate-shipment", "validated"),
            WorkflowEvent::step_completed(0, "validate-shipment", "validated", None),
            WorkflowEvent::transform_applied("update"),
            WorkflowEvent::step_started("update-fulfillment", "fulfillment"),
            WorkflowEvent::step_completed(2, "update-fulfillment", "fulfillment", Some(json!({}))),
            WorkflowEvent::run_succeeded(),
        ]);

        assert_eq!(summary.run_id(), Some(run_id));
        assert_eq!(summary.workflow_id(), "create-shipment");
        assert_eq!(summary.state(), RunState::Succeeded);
        assert_eq!(summary.completed_steps().len(), 2);
        assert!(summary.finished_at().is_some());

        let record = summary.record().unwrap();
        assert_eq!(
            record.step_names(),
            vec!["validate-shipment", "update-fulfillment"]
        );
    }

    #[test]
    fn test_replay_failed_run() {
        let summary = RunSummary::from_events([
            WorkflowEvent::run_started(RunId::new(), "fulfil-order"),
            WorkflowEvent::step_completed(0, "reserve-inventory", "reservation", None),
            WorkflowEvent::step_completed(1, "hold-funds", "hold", None),
            WorkflowEvent::step_failed("charge-payment", "card declined"),
            WorkflowEvent::compensation_started("charge-payment failed"),
        ]);
        assert_eq!(summary.state(), RunState::Compensating);
        assert_eq!(summary.failed_node(), Some("charge-payment"));

        let mut summary = summary;
        summary.apply(WorkflowEvent::compensation_failed("hold-funds", "timeout"));
        summary.apply(WorkflowEvent::step_compensated(
            "reserve-inventory",
            "reservation",
        ));
        summary.apply(WorkflowEvent::run_failed("card declined"));

        assert_eq!(summary.state(), RunState::Failed);
        assert_eq!(summary.compensation_failures(), &["hold-funds"]);
        assert_eq!(summary.compensated_steps(), &["reserve-inventory"]);
        assert_eq!(summary.failure_reason(), Some("card declined"));
    }
}
