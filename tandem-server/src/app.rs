use crate::config::RelayConfig;
use crate::room::RoomManager;
use crate::signaling::{SignalingService, ws_handler};
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tandem_core::utils::HEALTH_RESPONSE;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub signaling: SignalingService,
    pub rooms: RoomManager,
}

impl AppState {
    pub fn new(max_room_members: Option<usize>) -> Self {
        let signaling = SignalingService::new();
        let rooms = RoomManager::new(Arc::new(signaling.clone()), max_room_members);
        Self { signaling, rooms }
    }
}

pub async fn health() -> &'static str {
    HEALTH_RESPONSE
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Runs the relay on an already bound listener until the server stops.
pub async fn serve(listener: TcpListener, config: &RelayConfig) -> anyhow::Result<()> {
    let state = AppState::new(config.max_room_members);
    let app = router(state, config.cors_layer());

    info!("Signaling on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
