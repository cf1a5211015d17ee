use utoipa::OpenApi;

use crate::routes::responses::{ActionResponseInput, TextResponseInput};
use crate::routes::scheduler::DebugQuery;
use crate::routes::tasks::TaskListQuery;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use nudge_core::gateway::{ActionOption, ActionOptions, Notification, NotificationKind};
use nudge_core::nudge::DebugSnapshot;
use nudge_core::pending::{PendingEntry, PendingKey};
use nudge_core::processor::ResponseOutcome;
use nudge_core::scheduler::TickReport;
use nudge_core::types::{
    ConversationId, CreateTaskInput, Frequency, ReminderRecord, ReminderTier, ResponseLogEntry,
    Task, TaskId, TaskResponse, TaskState, TaskStatus, TaskView, UserHandle,
};
use nudge_events::{EventRecord, EventSource};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::tasks::create_task,
        crate::routes::tasks::list_tasks,
        crate::routes::tasks::get_task,
        crate::routes::tasks::delete_task,
        crate::routes::tasks::list_responses,
        crate::routes::responses::respond,
        crate::routes::responses::respond_text,
        crate::routes::scheduler::tick,
        crate::routes::scheduler::debug_snapshot,
        crate::routes::events::event_stream,
        crate::routes::events::notification_stream,
        crate::routes::events::notification_socket,
    ),
    components(schemas(
        Task,
        TaskView,
        CreateTaskInput,
        TaskListQuery,
        ReminderRecord,
        ResponseLogEntry,
        ActionResponseInput,
        TextResponseInput,
        ResponseOutcome,
        TickReport,
        DebugQuery,
        DebugSnapshot,
        PendingKey,
        PendingEntry,
        Notification,
        NotificationKind,
        ActionOption,
        ActionOptions,
        EventRecord,
        EventSource,
        TaskId,
        UserHandle,
        ConversationId,
        Frequency,
        TaskStatus,
        TaskState,
        TaskResponse,
        ReminderTier
    ))
)]
struct ApiDoc;

pub fn generate_spec() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .unwrap_or_else(|_| "{}".to_string())
}

pub fn router() -> Router {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
