//! Execution journal.
//!
//! A journal is an append-only log of the events of every run, keyed by run
//! id and a per-run sequence number starting at 1. It is optional: the engine
//! only writes to it when the host configured one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::RunId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::JournalError;
use crate::events::WorkflowEvent;
use crate::summary::RunSummary;

pub type Result<T> = std::result::Result<T, JournalError>;

/// One journaled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub run_id: RunId,
    pub workflow_id: String,
    /// Position of the event within its run, starting at 1.
    pub sequence: u64,
    pub event_type: String,
    pub payload: Value,
    pub recorded_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(
        run_id: RunId,
        workflow_id: impl Into<String>,
        sequence: u64,
        event: &WorkflowEvent,
    ) -> Result<Self> {
        Ok(Self {
            run_id,
            workflow_id: workflow_id.into(),
            sequence,
            event_type: event.event_type().to_string(),
            payload: serde_json::to_value(event)?,
            recorded_at: Utc::now(),
        })
    }

    /// Decodes the journaled event.
    pub fn event(&self) -> Result<WorkflowEvent> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Append-only storage for run events.
#[async_trait]
pub trait ExecutionJournal: Send + Sync {
    /// Appends an entry.
    ///
    /// Fails with `SequenceConflict` unless `entry.sequence` is exactly one
    /// past the run's last sequence.
    async fn append(&self, entry: JournalEntry) -> Result<()>;

    /// Entries of a run, in sequence order.
    async fn entries_for_run(&self, run_id: RunId) -> Result<Vec<JournalEntry>>;

    /// Runs of a workflow, in the order they started.
    async fn runs_for_workflow(&self, workflow_id: &str) -> Result<Vec<RunId>>;
}

/// Convenience methods for journals.
#[async_trait]
pub trait ExecutionJournalExt: ExecutionJournal {
    /// Last sequence number of a run, 0 if nothing was journaled.
    async fn last_sequence(&self, run_id: RunId) -> Result<u64> {
        Ok(self
            .entries_for_run(run_id)
            .await?
            .last()
            .map(|e| e.sequence)
            .unwrap_or(0))
    }

    /// Rebuilds a run's summary, `None` if the run is unknown.
    async fn load_summary(&self, run_id: RunId) -> Result<Option<RunSummary>> {
        let entries = self.entries_for_run(run_id).await?;
        if entries.is_empty() {
            return Ok(None);
        }
        let events = entries
            .iter()
            .map(JournalEntry::event)
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(RunSummary::from_events(events)))
    }
}

impl<T: ExecutionJournal + ?Sized> ExecutionJournalExt for T {}

/// In-memory journal for tests and single-process hosts.
#[derive(Clone, Default)]
pub struct InMemoryJournal {
    entries: Arc<RwLock<Vec<JournalEntry>>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl ExecutionJournal for InMemoryJournal {
    async fn append(&self, entry: JournalEntry) -> Result<()> {
        let mut entries = self.entries.write().await;

        let current = entries
            .iter()
            .filter(|e| e.run_id == entry.run_id)
            .map(|e| e.sequence)
            .max()
            .unwrap_or(0);

        if entry.sequence != current + 1 {
            return Err(JournalError::SequenceConflict {
                run_id: entry.run_id,
                expected: current + 1,
                actual: entry.sequence,
            });
        }

        entries.push(entry);
        Ok(())
    }

    async fn entries_for_run(&self, run_id: RunId) -> Result<Vec<JournalEntry>> {
        let entries = self.entries.read().await;
        let mut found: Vec<_> = entries
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.sequence);
        Ok(found)
    }

    async fn runs_for_workflow(&self, workflow_id: &str) -> Result<Vec<RunId>> {
        let entries = self.entries.read().await;
        let mut runs = Vec::new();
        for entry in entries.iter().filter(|e| e.workflow_id == workflow_id) {
            if !runs.contains(&entry.run_id) {
                runs.push(entry.run_id);
            }
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RunState;

    fn entry(run_id: RunId, sequence: u64, event: WorkflowEvent) -> JournalEntry {
        JournalEntry::new(run_id, "wf", sequence, &event).unwrap()
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let journal = InMemoryJournal::new();
        let run_id = RunId::new();

        journal
            .append(entry(run_id, 1, WorkflowEvent::run_started(run_id, "wf")))
            .await
            .unwrap();
        journal
            .append(entry(run_id, 2, WorkflowEvent::run_succeeded()))
            .await
            .unwrap();

        let entries = journal.entries_for_run(run_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, "RunStarted");
        assert_eq!(entries[1].event().unwrap().event_type(), "RunSucceeded");
        assert_eq!(journal.last_sequence(run_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sequence_conflict() {
        let journal = InMemoryJournal::new();
        let run_id = RunId::new();

        journal
            .append(entry(run_id, 1, WorkflowEvent::run_started(run_id, "wf")))
            .await
            .unwrap();

        let result = journal
            .append(entry(run_id, 1, WorkflowEvent::run_succeeded()))
            .await;
        assert!(matches!(
            result,
            Err(JournalError::SequenceConflict {
                expected: 2,
                actual: 1,
                ..
            })
        ));

        let result = journal
            .append(entry(run_id, 3, WorkflowEvent::run_succeeded()))
            .await;
        assert!(matches!(result, Err(JournalError::SequenceConflict { .. })));
    }

    #[tokio::test]
    async fn test_sequences_are_per_run() {
        let journal = InMemoryJournal::new();
        let a = RunId::new();
        let b = RunId::new();

        journal
            .append(entry(a, 1, WorkflowEvent::run_started(a, "wf")))
            .await
            .unwrap();
        journal
            .append(entry(b, 1, WorkflowEvent::run_started(b, "wf")))
            .await
            .unwrap();

        assert_eq!(journal.runs_for_workflow("wf").await.unwrap(), vec![a, b]);
        assert!(journal.runs_for_workflow("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_summary() {
        let journal = InMemoryJournal::new();
        let run_id = RunId::new();

        assert!(journal.load_summary(run_id).await.unwrap().is_none());

        journal
            .append(entry(run_id, 1, WorkflowEvent::run_started(run_id, "wf")))
            .await
            .unwrap();
        journal
            .append(entry(run_id, 2, WorkflowEvent::step_failed("a", "boom")))
            .await
            .unwrap();
        journal
            .append(entry(run_id, 3, WorkflowEvent::compensation_started("a failed")))
            .await
            .unwrap();
        journal
            .append(entry(run_id, 4, WorkflowEvent::run_failed("boom")))
            .await
            .unwrap();

        let summary = journal.load_summary(run_id).await.unwrap().unwrap();
        assert_eq!(summary.state(), RunState::Failed);
        assert_eq!(summary.failed_node(), Some("a"));
    }
}
