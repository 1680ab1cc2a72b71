//! Minigolf server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod auth;
pub mod collider;
pub mod config;
pub mod connection;
pub mod engine;
pub mod game_loop;
pub mod game_map;
pub mod geometry;
pub mod mesh;
pub mod player;
pub mod protocol;
pub mod registry;
pub mod state;
pub mod store;
pub mod ws;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

/// HTTP routes of the game server.
pub fn router(app_state: ws::AppState) -> Router {
    Router::new()
        .route("/ws/game/{game_id}", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
