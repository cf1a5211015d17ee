use crate::AppState;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{invalid_input, map_error};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use nudge_core::RequestContext;
use nudge_core::nudge::DebugSnapshot;
use nudge_core::scheduler::TickReport;
use nudge_core::types::ConversationId;
use nudge_events::EventSource;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, serde::Deserialize, ToSchema, IntoParams)]
pub struct DebugQuery {
    conversation: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/scheduler/tick", post(tick))
        .route("/debug", get(debug_snapshot))
        .with_state(state)
}

/// Runs one scheduler pass immediately. Overlaps with the periodic loop are
/// reported as `skipped`.
#[utoipa::path(
    post,
    path = "/api/scheduler/tick",
    responses((status = 200, body = TickReport))
)]
pub(crate) async fn tick(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
) -> Response {
    let ctx = RequestContext::new(EventSource::Admin, Some(correlation.0));
    let report = state.nudge.scheduler().tick(&ctx).await;
    Json(report).into_response()
}

#[utoipa::path(
    get,
    path = "/api/debug",
    params(DebugQuery),
    responses((status = 200, body = DebugSnapshot))
)]
pub(crate) async fn debug_snapshot(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Query(query): Query<DebugQuery>,
) -> Response {
    let result = query
        .conversation
        .map(ConversationId::new)
        .transpose()
        .map_err(invalid_input)
        .and_then(|conversation| state.nudge.debug_snapshot(conversation.as_ref()));
    match result {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}
