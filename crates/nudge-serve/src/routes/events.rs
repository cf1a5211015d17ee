use crate::AppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events/stream", get(event_stream))
        .route("/notifications/stream", get(notification_stream))
        .route("/notifications/ws", get(notification_socket))
        .with_state(state)
}

/// Lifecycle events as server-sent events.
#[utoipa::path(get, path = "/api/events/stream", responses((status = 200)))]
pub(crate) async fn event_stream(State(state): State<AppState>) -> Response {
    crate::sse::stream(state.event_bus.subscribe(), "lifecycle")
}

/// Outbound notifications as server-sent events. Connecting a stream is
/// what makes deliveries succeed.
#[utoipa::path(get, path = "/api/notifications/stream", responses((status = 200)))]
pub(crate) async fn notification_stream(State(state): State<AppState>) -> Response {
    crate::sse::stream(state.outbound.subscribe(), "notification")
}

#[utoipa::path(get, path = "/api/notifications/ws", responses((status = 101)))]
pub(crate) async fn notification_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let receiver = state.outbound.subscribe();
    ws.on_upgrade(move |socket| handle_stream(socket, receiver))
}

async fn handle_stream<T: Serialize + Clone>(mut socket: WebSocket, mut receiver: broadcast::Receiver<T>) {
    loop {
        match receiver.recv().await {
            Ok(item) => {
                let json = serde_json::to_string(&item).unwrap_or_else(|_| "{}".to_string());
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!("notification socket closed");
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "notification socket lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
