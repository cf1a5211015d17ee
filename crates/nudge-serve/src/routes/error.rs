use axum::Json;
use axum::http::StatusCode;
use nudge_core::NudgeError;
use nudge_core::error::{GatewayError, TaskError};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
    pub correlation_id: Option<String>,
}

pub fn map_error(
    err: &NudgeError,
    correlation_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    let (status, code) = match err {
        NudgeError::Task(task) => map_task_error(task),
        NudgeError::Gateway(gateway) => map_gateway_error(gateway),
        NudgeError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };
    if status.is_server_error() {
        warn!(%status, code, error = %err, correlation_id = correlation_id.as_deref(), "request failed");
    }

    (
        status,
        Json(ErrorEnvelope {
            code,
            message: err.to_string(),
            correlation_id,
        }),
    )
}

fn map_task_error(err: &TaskError) -> (StatusCode, &'static str) {
    match err {
        TaskError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        TaskError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "invalid_input"),
        TaskError::InvalidTransition { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_state"),
        TaskError::Storage { .. } => (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable"),
    }
}

fn map_gateway_error(err: &GatewayError) -> (StatusCode, &'static str) {
    match err {
        GatewayError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        GatewayError::Unavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, "gateway_unavailable"),
        GatewayError::Rejected { .. } => (StatusCode::BAD_GATEWAY, "gateway_rejected"),
    }
}

/// Shorthand for handlers rejecting a malformed field before reaching the
/// engine.
pub fn invalid_input(err: impl std::fmt::Display) -> NudgeError {
    NudgeError::Task(TaskError::invalid(err))
}
