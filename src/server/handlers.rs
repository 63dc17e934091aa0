use crate::engine::RunCorrelator;
use crate::error::{
    CancelError, ConfigError, DispatchError, InvalidRunId, QueryError, ResolveError, TriggerError,
};
use crate::model::{RunId, RunState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

pub(crate) type AppState = Arc<RunCorrelator>;

/// JSON error body plus the status it is sent with.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    fn config(err: &ConfigError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "status": "error", "error": err.to_string() }),
        }
    }

    /// Relay the platform's own status code and body.
    fn platform(status: u16, body: String) -> Self {
        Self {
            status: StatusCode::from_u16(status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            body: json!({ "status": "error", "details": body }),
        }
    }

    fn invalid_run_id(err: &InvalidRunId) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "status": "error", "error": err.to_string() }),
        }
    }

    fn bad_gateway(details: String) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            body: json!({ "status": "error", "details": details }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<TriggerError> for ApiError {
    fn from(err: TriggerError) -> Self {
        match err {
            TriggerError::Dispatch(DispatchError::Config(e)) => ApiError::config(&e),
            TriggerError::Dispatch(DispatchError::Rejected { status, body }) => {
                ApiError::platform(status, body)
            }
            TriggerError::Dispatch(e @ DispatchError::Transport(_)) => {
                ApiError::bad_gateway(e.to_string())
            }
            TriggerError::Resolve(e @ ResolveError::NotFound { .. }) => ApiError {
                status: StatusCode::NOT_FOUND,
                body: json!({
                    "status": "error",
                    "message": "Action triggered but no matching run was found",
                    "details": e.to_string(),
                }),
            },
            TriggerError::Resolve(ResolveError::QueryFailed(e)) => e.into(),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Config(e) => ApiError::config(&e),
            QueryError::InvalidRunId(e) => ApiError::invalid_run_id(&e),
            QueryError::Status { status, body } => ApiError::platform(status, body),
            e @ (QueryError::Transport(_) | QueryError::Decode(_)) => {
                ApiError::bad_gateway(e.to_string())
            }
        }
    }
}

impl From<CancelError> for ApiError {
    fn from(err: CancelError) -> Self {
        match err {
            CancelError::Config(e) => ApiError::config(&e),
            CancelError::InvalidRunId(e) => ApiError::invalid_run_id(&e),
            CancelError::Rejected { status, body } => ApiError::platform(status, body),
            e @ CancelError::Transport(_) => ApiError::bad_gateway(e.to_string()),
        }
    }
}

pub(crate) async fn index() -> &'static str {
    "✅ Running!"
}

pub(crate) async fn trigger_run(
    State(correlator): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let run = correlator.start().await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Action triggered",
        "run_id": run.run_id,
    })))
}

pub(crate) async fn latest_run_id(State(correlator): State<AppState>) -> Response {
    match correlator.last_tracked().await {
        Some(run_id) => Json(json!({ "run_id": run_id })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No run has been triggered yet" })),
        )
            .into_response(),
    }
}

pub(crate) async fn cancel_run(
    State(correlator): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let cancelled = correlator.cancel(&RunId::from(run_id)).await?;
    Ok(Json(json!({
        "status": "cancelled",
        "run_id": cancelled.run_id,
    })))
}

pub(crate) async fn run_status(
    State(correlator): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunState>, ApiError> {
    let state = correlator.status(&RunId::from(run_id)).await?;
    Ok(Json(state))
}
