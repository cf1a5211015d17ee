use crate::AppState;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{invalid_input, map_error};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use nudge_core::RequestContext;
use nudge_core::types::{
    ConversationId, CreateTaskInput, ResponseLogEntry, Task, TaskFilter, TaskId, TaskStatus,
    TaskView,
};
use nudge_events::EventSource;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, serde::Deserialize, ToSchema, IntoParams)]
pub struct TaskListQuery {
    conversation: Option<String>,
    /// Defaults to `Active`.
    status: Option<TaskStatus>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/{id}", get(get_task).delete(delete_task))
        .route("/tasks/{id}/responses", get(list_responses))
        .with_state(state)
}

pub(crate) fn parse_task_id(raw: &str) -> Result<TaskId, nudge_core::NudgeError> {
    raw.parse::<TaskId>().map_err(invalid_input)
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskInput,
    responses((status = 200, body = Task))
)]
pub(crate) async fn create_task(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Json(input): Json<CreateTaskInput>,
) -> Response {
    let ctx = RequestContext::new(EventSource::Admin, Some(correlation.0));
    match state.nudge.tasks().create(&ctx, input) {
        Ok(task) => Json(task).into_response(),
        Err(err) => map_error(&err, ctx.correlation_id).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    params(TaskListQuery),
    responses((status = 200, body = Vec<Task>))
)]
pub(crate) async fn list_tasks(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Query(query): Query<TaskListQuery>,
) -> Response {
    let conversation = match query.conversation.map(ConversationId::new).transpose() {
        Ok(value) => value,
        Err(err) => return map_error(&invalid_input(err), Some(correlation.0)).into_response(),
    };
    let filter = TaskFilter {
        conversation,
        status: Some(vec![query.status.unwrap_or(TaskStatus::Active)]),
    };
    match state.nudge.tasks().list(&filter) {
        Ok(tasks) => Json(tasks).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    responses((status = 200, body = TaskView))
)]
pub(crate) async fn get_task(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let result = parse_task_id(&id).and_then(|id| state.nudge.tasks().view(id));
    match result {
        Ok(view) => Json(view).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    responses((status = 200, body = Task))
)]
pub(crate) async fn delete_task(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let ctx = RequestContext::new(EventSource::Admin, Some(correlation.0));
    let result = parse_task_id(&id).and_then(|id| state.nudge.tasks().remove(&ctx, id));
    match result {
        Ok(task) => Json(task).into_response(),
        Err(err) => map_error(&err, ctx.correlation_id).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}/responses",
    params(("id" = i64, Path, description = "Task ID")),
    responses((status = 200, body = Vec<ResponseLogEntry>))
)]
pub(crate) async fn list_responses(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let result = parse_task_id(&id).and_then(|id| state.nudge.tasks().responses(id));
    match result {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}
