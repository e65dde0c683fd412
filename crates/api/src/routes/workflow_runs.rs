//! Workflow run inspection endpoints backed by the execution journal.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::RunId;
use serde::Serialize;
use uuid::Uuid;
use workflow::{ExecutionJournalExt, RunSummary};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct RunsResponse {
    pub runs: Vec<RunSummary>,
}

/// GET /admin/workflows/{workflow_id}/runs: every journaled run of a
/// workflow, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<RunsResponse>, ApiError> {
    let mut runs = Vec::new();
    for run_id in state.journal.runs_for_workflow(&workflow_id).await? {
        if let Some(summary) = state.journal.load_summary(run_id).await? {
            runs.push(summary);
        }
    }
    Ok(Json(RunsResponse { runs }))
}

/// GET /admin/workflow-runs/{run_id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<RunSummary>, ApiError> {
    state
        .journal
        .load_summary(RunId::from_uuid(run_id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Workflow run {run_id} not found")))
}
