//! Events emitted while a run executes.

use chrono::{DateTime, Utc};
use common::RunId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::CompletedStep;

/// Everything observable that happens during a run, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WorkflowEvent {
    /// The run left `Pending`.
    RunStarted(RunStartedData),

    /// A step's forward action is about to run.
    StepStarted(NodeData),

    /// A step's forward action succeeded.
    StepCompleted(CompletedStep),

    /// A step's forward action failed.
    StepFailed(NodeFailedData),

    /// A transform produced its value.
    TransformApplied(NodeData),

    /// A transform failed or the data it read was malformed.
    TransformFailed(NodeFailedData),

    /// The compensation sweep started.
    CompensationStarted(CompensationData),

    /// A completed step was compensated.
    StepCompensated(NodeData),

    /// A compensation failed (the sweep continues).
    CompensationFailed(NodeFailedData),

    /// Every node completed.
    RunSucceeded(RunSucceededData),

    /// The compensation sweep finished.
    RunFailed(RunFailedData),
}

impl WorkflowEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::RunStarted(_) => "RunStarted",
            WorkflowEvent::StepStarted(_) => "StepStarted",
            WorkflowEvent::StepCompleted(_) => "StepCompleted",
            WorkflowEvent::StepFailed(_) => "StepFailed",
            WorkflowEvent::TransformApplied(_) => "TransformApplied",
            WorkflowEvent::TransformFailed(_) => "TransformFailed",
            WorkflowEvent::CompensationStarted(_) => "CompensationStarted",
            WorkflowEvent::StepCompensated(_) => "StepCompensated",
            WorkflowEvent::CompensationFailed(_) => "CompensationFailed",
            WorkflowEvent::RunSucceeded(_) => "RunSucceeded",
            WorkflowEvent::RunFailed(_) => "RunFailed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStartedData {
    pub run_id: RunId,
    pub workflow_id: String,
    pub started_at: DateTime<Utc>,
}

/// Identifies a node by name and alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub name: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFailedData {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationData {
    /// What triggered the sweep.
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSucceededData {
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl WorkflowEvent {
    pub fn run_started(run_id: RunId, workflow_id: impl Into<String>) -> Self {
        WorkflowEvent::RunStarted(RunStartedData {
            run_id,
            workflow_id: workflow_id.into(),
            started_at: Utc::now(),
        })
    }

    pub fn step_started(name: impl Into<String>, alias: impl Into<String>) -> Self {
        WorkflowEvent::StepStarted(NodeData {
            name: name.into(),
            alias: alias.into(),
        })
    }

    pub fn step_completed(
        index: usize,
        step: impl Into<String>,
        alias: impl Into<String>,
        compensate_with: Option<Value>,
    ) -> Self {
        WorkflowEvent::StepCompleted(CompletedStep {
            index,
            step: step.into(),
            alias: alias.into(),
            compensate_with,
        })
    }

    pub fn step_failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        WorkflowEvent::StepFailed(NodeFailedData {
            name: name.into(),
            error: error.into(),
        })
    }

    pub fn transform_applied(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        WorkflowEvent::TransformApplied(NodeData {
            name: alias.clone(),
            alias,
        })
    }

    pub fn transform_failed(alias: impl Into<String>, error: impl Into<String>) -> Self {
        WorkflowEvent::TransformFailed(NodeFailedData {
            name: alias.into(),
            error: error.into(),
        })
    }

    pub fn compensation_started(reason: impl Into<String>) -> Self {
        WorkflowEvent::CompensationStarted(CompensationData {
            reason: reason.into(),
        })
    }

    pub fn step_compensated(name: impl Into<String>, alias: impl Into<String>) -> Self {
        WorkflowEvent::StepCompensated(NodeData {
            name: name.into(),
            alias: alias.into(),
        })
    }

    pub fn compensation_failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        WorkflowEvent::CompensationFailed(NodeFailedData {
            name: name.into(),
            error: error.into(),
        })
    }

    pub fn run_succeeded() -> Self {
        WorkflowEvent::RunSucceeded(RunSucceededData {
            completed_at: Utc::now(),
        })
    }

    pub fn run_failed(reason: impl Into<String>) -> Self {
        WorkflowEvent::RunFailed(RunFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}
