//! Axum server hosting Contact's WebSocket game rooms.
//!
//! # Routes
//!
//! | Method | Path  | Description                      |
//! |--------|-------|----------------------------------|
//! | `GET`  | `/ws` | WebSocket upgrade for game sessions |
//!
//! HTTP sign-up/sign-in, session cookies, static asset serving, and the
//! key/value store client are out of scope here (spec §1) — `Repository`
//! is backed by the in-process `Store`; swapping it for a networked
//! backend does not change anything above this file.

mod broadcast;
mod session_hub;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use contact_core::{Config, Repository, Store};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use broadcast::BroadcastRegistry;

/// Shared application state available to all handlers.
#[derive(Clone)]
struct AppState {
    registry: Arc<BroadcastRegistry>,
    repository: Repository,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::load());
    let repository = Repository::new(Arc::new(Store::new()), config);

    let state = AppState { registry: Arc::new(BroadcastRegistry::new()), repository };

    let app = Router::new().route("/ws", get(ws_handler)).layer(CorsLayer::permissive()).with_state(state);

    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Contact server listening");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// `GET /ws` — upgrade to WebSocket and hand off to [`session_hub::handle_socket`].
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session_hub::handle_socket(socket, state.registry, state.repository))
}
