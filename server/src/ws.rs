use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::auth::Credentials;
use crate::connection::Connection;
use crate::game_loop::GameHandle;
use crate::registry::GameRegistry;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub registry: GameRegistry,
    pub credentials: Arc<dyn Credentials>,
}

impl AppState {
    pub fn new(registry: GameRegistry) -> Self {
        let credentials = registry.collaborators().credentials.clone();
        Self {
            registry,
            credentials,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JoinQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /ws/game/{game_id}`: reconnect with a valid token, otherwise join.
/// Unknown ids open a new lobby while the registry has room.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<String>,
    Query(query): Query<JoinQuery>,
    State(app_state): State<AppState>,
) -> Response {
    let Some(game) = app_state.registry.get_or_create(&game_id).await else {
        return (StatusCode::SERVICE_UNAVAILABLE, "too many games").into_response();
    };

    let returning = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .and_then(|token| match app_state.credentials.validate_player_token(token, &game_id) {
            Ok(player_id) => Some(player_id),
            Err(e) => {
                tracing::debug!(game = %game_id, "Token rejected: {}", e);
                None
            }
        });

    if returning.is_none() && !game.is_joinable().await {
        tracing::info!(game = %game_id, "Refusing join: game not joinable");
        return (StatusCode::FORBIDDEN, "game is not joinable").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, game, query.name, returning))
}

async fn handle_socket(socket: WebSocket, game: GameHandle, name: String, returning: Option<u32>) {
    let connection = Connection::from_websocket(socket);
    match returning {
        Some(player_id) => {
            if let Err(e) = game.reconnect_player(player_id, connection).await {
                tracing::warn!(game = %game.id(), player_id, "Reconnect failed: {}", e);
            }
        }
        None => match game.add_player(&name, connection).await {
            Ok(player_id) => tracing::info!(game = %game.id(), player_id, "Player connected"),
            Err(e) => tracing::warn!(game = %game.id(), "Join failed: {}", e),
        },
    }
}
