//! Record of the steps a run completed.

use common::RunId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A step whose forward action succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedStep {
    /// Position of the step among the workflow's nodes.
    pub index: usize,
    pub step: String,
    pub alias: String,
    /// Input for the step's compensation, as recorded by the forward action.
    pub compensate_with: Option<Value>,
}

/// Completed steps of a run, in completion order.
///
/// The engine owns the record while the run is in flight. A successful run
/// hands it to the caller so the run can be rolled back later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub run_id: RunId,
    pub workflow_id: String,
    pub completed: Vec<CompletedStep>,
}

impl ExecutionRecord {
    pub fn new(run_id: RunId, workflow_id: impl Into<String>) -> Self {
        Self {
            run_id,
            workflow_id: workflow_id.into(),
            completed: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, step: CompletedStep) {
        self.completed.push(step);
    }

    /// Completed steps, last completed first.
    pub fn unwind_order(&self) -> impl Iterator<Item = &CompletedStep> {
        self.completed.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// Names of the completed steps, in completion order.
    pub fn step_names(&self) -> Vec<&str> {
        self.completed.iter().map(|c| c.step.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn completed(index: usize, step: &str) -> CompletedStep {
        CompletedStep {
            index,
            step: step.into(),
            alias: step.into(),
            compensate_with: Some(json!(index)),
        }
    }

    #[test]
    fn unwind_order_is_reverse_completion_order() {
        let mut record = ExecutionRecord::new(RunId::new(), "wf");
        record.push(completed(0, "a"));
        record.push(completed(2, "b"));
        record.push(completed(3, "c"));

        let order: Vec<_> = record.unwind_order().map(|c| c.step.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
        assert_eq!(record.step_names(), vec!["a", "b", "c"]);
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn record_is_serializable() {
        let mut record = ExecutionRecord::new(RunId::new(), "wf");
        record.push(completed(0, "a"));

        let json = serde_json::to_value(&record).unwrap();
        let back: ExecutionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
