use crate::AppState;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{invalid_input, map_error};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use nudge_core::processor::ResponseOutcome;
use nudge_core::types::{ConversationId, RespondInput, TaskId, TaskResponse, UserHandle};
use nudge_core::{NudgeError, RequestContext};
use nudge_events::EventSource;
use utoipa::ToSchema;

/// A button press: the transport knows which task it belongs to.
#[derive(Debug, serde::Deserialize, ToSchema)]
pub struct ActionResponseInput {
    task_id: TaskId,
    responder: String,
    conversation: String,
    response: TaskResponse,
}

/// A typed reply, routed to the responder's most recent notification.
#[derive(Debug, serde::Deserialize, ToSchema)]
pub struct TextResponseInput {
    responder: String,
    conversation: String,
    text: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/responses", post(respond))
        .route("/responses/text", post(respond_text))
        .with_state(state)
}

fn handles(responder: String, conversation: String) -> Result<(UserHandle, ConversationId), NudgeError> {
    let responder = UserHandle::new(responder).map_err(invalid_input)?;
    let conversation = ConversationId::new(conversation).map_err(invalid_input)?;
    Ok((responder, conversation))
}

#[utoipa::path(
    post,
    path = "/api/responses",
    request_body = ActionResponseInput,
    responses((status = 200, body = ResponseOutcome))
)]
pub(crate) async fn respond(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Json(input): Json<ActionResponseInput>,
) -> Response {
    let ctx = RequestContext::new(EventSource::Response, Some(correlation.0));
    let result = handles(input.responder, input.conversation).and_then(|(responder, conversation)| {
        state.nudge.responses().apply(
            &ctx,
            RespondInput {
                task_id: input.task_id,
                responder,
                conversation,
                response: input.response,
            },
        )
    });
    match result {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => map_error(&err, ctx.correlation_id).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/responses/text",
    request_body = TextResponseInput,
    responses((status = 200, body = ResponseOutcome))
)]
pub(crate) async fn respond_text(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Json(input): Json<TextResponseInput>,
) -> Response {
    let ctx = RequestContext::new(EventSource::Response, Some(correlation.0));
    let result = handles(input.responder, input.conversation).and_then(|(responder, conversation)| {
        state
            .nudge
            .responses()
            .apply_text(&ctx, responder, conversation, &input.text)
    });
    match result {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => map_error(&err, ctx.correlation_id).into_response(),
    }
}
