pub mod error;
pub mod events;
pub mod responses;
pub mod scheduler;
pub mod tasks;

use crate::middleware::correlation::correlation_middleware;
use crate::{AppState, openapi};
use axum::Router;
use axum::middleware;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(tasks::router(state.clone()))
        .merge(responses::router(state.clone()))
        .merge(scheduler::router(state.clone()))
        .merge(events::router(state))
        .merge(openapi::router())
        .route_layer(middleware::from_fn(correlation_middleware));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}
