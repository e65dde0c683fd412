//! Run state machine.

use serde::{Deserialize, Serialize};

/// The state of a single workflow run.
///
/// State transitions:
/// ```text
/// Pending ──► Running ──┬──► Succeeded
///                       └──► Compensating ──► Failed
/// Pending ──────────────────────────────────► Failed   (pre-flight failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RunState {
    /// Input received, no node executed yet.
    #[default]
    Pending,

    /// Nodes are being executed in definition order.
    Running,

    /// A node failed and completed steps are being compensated.
    Compensating,

    /// Every node completed (terminal state).
    Succeeded,

    /// The compensation sweep finished after a failure (terminal state).
    Failed,
}

impl RunState {
    /// Returns true if the run can start executing nodes.
    pub fn can_run(&self) -> bool {
        matches!(self, RunState::Pending)
    }

    /// Returns true if the run can enter the compensation sweep.
    pub fn can_compensate(&self) -> bool {
        matches!(self, RunState::Running)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "Pending",
            RunState::Running => "Running",
            RunState::Compensating => "Compensating",
            RunState::Succeeded => "Succeeded",
            RunState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
