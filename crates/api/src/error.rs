//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use commerce::CommerceError;
use thiserror::Error;
use workflow::{FailureCause, FailureKind, JournalError, WorkflowFailure};

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// A workflow run failed and was compensated.
    #[error(transparent)]
    Workflow(#[from] WorkflowFailure),

    /// A legacy-path service call failed.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    /// The workflow journal could not be read.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Invalid => StatusCode::BAD_REQUEST,
        FailureKind::NotFound => StatusCode::NOT_FOUND,
        FailureKind::Conflict => StatusCode::CONFLICT,
        FailureKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Workflow(failure) => workflow_failure_to_response(failure),
            ApiError::Commerce(err) => (status_for(err.kind()), err.to_string()),
            ApiError::Journal(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn workflow_failure_to_response(failure: WorkflowFailure) -> (StatusCode, String) {
    for err in failure.failed_compensations() {
        tracing::error!(
            workflow_id = %failure.workflow_id,
            run_id = %failure.run_id,
            step = %err.step,
            error = %err.source,
            "compensation left data behind"
        );
    }

    let status = status_for(failure.kind());
    let message = match &failure.cause {
        FailureCause::Step { error, .. } if status != StatusCode::INTERNAL_SERVER_ERROR => {
            error.to_string()
        }
        _ => failure.to_string(),
    };
    (status, message)
}

#[cfg(test)]
mod tests {
    use common::RunId;
    use workflow::StepError;

    use super::*;

    fn failure(error: StepError) -> ApiError {
        ApiError::Workflow(WorkflowFailure {
            workflow_id: "wf".into(),
            run_id: RunId::new(),
            cause: FailureCause::Step {
                step: "s".into(),
                error,
            },
            compensations: Vec::new(),
        })
    }

    #[test]
    fn test_workflow_failure_status() {
        let cases = [
            (StepError::Invalid("bad".into()), StatusCode::BAD_REQUEST),
            (StepError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (StepError::Conflict("taken".into()), StatusCode::CONFLICT),
            (
                StepError::Service("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(failure(error).into_response().status(), status);
        }
    }

    #[test]
    fn test_commerce_error_status() {
        let response =
            ApiError::from(CommerceError::not_found("Price list", "pl_1")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
