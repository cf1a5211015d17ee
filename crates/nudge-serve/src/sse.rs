use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::StreamExt;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

/// Streams every item received on `receiver` as a JSON SSE `data` frame
/// named `event`. Lagged items are dropped with a warning.
pub fn stream<T>(receiver: broadcast::Receiver<T>, event: &'static str) -> Response
where
    T: Serialize + Clone + Send + 'static,
{
    let live = BroadcastStream::new(receiver).filter_map(move |item| async move {
        match item {
            Ok(value) => {
                let json = serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_string());
                Some(Ok::<Event, std::convert::Infallible>(
                    Event::default().event(event).data(json),
                ))
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, stream = event, "sse subscriber lagged");
                None
            }
        }
    });
    Sse::new(live)
        .keep_alive(KeepAlive::default())
        .into_response()
}
