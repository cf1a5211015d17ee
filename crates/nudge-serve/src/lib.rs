pub mod gateway;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod sse;

use axum::Router;
use gateway::OutboundBus;
use nudge_core::Nudge;
use nudge_db::DbStore;
use nudge_events::EventBus;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub nudge: Arc<Nudge<DbStore>>,
    pub event_bus: EventBus,
    pub outbound: OutboundBus,
}

impl AppState {
    pub fn new(nudge: Arc<Nudge<DbStore>>, outbound: OutboundBus) -> Self {
        let event_bus = nudge.event_bus().clone();
        Self {
            nudge,
            event_bus,
            outbound,
        }
    }
}

pub fn app(state: AppState) -> Router {
    routes::router(state)
}

pub async fn serve<F>(
    state: AppState,
    addr: std::net::SocketAddr,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
}
