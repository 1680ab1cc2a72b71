use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::connection::{Connection, PlayerEvent, PlayerPumps};
use crate::protocol::OutboundFrame;
pub use crate::state::GameError;
use crate::state::{MatchState, MatchStatus};

const COMMAND_QUEUE: usize = 64;
const EVENT_QUEUE: usize = 256;

/// Commands from collaborators (route handlers, registry) to one match loop
pub enum GameCommand {
    AddPlayer {
        name: String,
        connection: Connection,
        response: oneshot::Sender<Result<u32, GameError>>,
    },
    ReconnectPlayer {
        player_id: u32,
        connection: Connection,
        response: oneshot::Sender<Result<(), GameError>>,
    },
    IsJoinable {
        response: oneshot::Sender<bool>,
    },
    IsIdle {
        response: oneshot::Sender<bool>,
    },
    PrettyString {
        response: oneshot::Sender<String>,
    },
    Stop {
        response: oneshot::Sender<()>,
    },
}

/// Loop timing and queue sizes
#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    pub tick: Duration,
    pub idle_timeout: Duration,
    pub outbound_capacity: usize,
}

/// Cloneable front of a running match.
#[derive(Clone)]
pub struct GameHandle {
    id: Arc<str>,
    cmd_tx: mpsc::Sender<GameCommand>,
}

impl GameHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True once the match loop has exited.
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    /// Whether both handles front the same match loop, not merely the same id.
    pub fn same_game(&self, other: &GameHandle) -> bool {
        self.cmd_tx.same_channel(&other.cmd_tx)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> GameCommand,
    ) -> Result<T, GameError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| GameError::Closed)?;
        rx.await.map_err(|_| GameError::Closed)
    }

    pub async fn add_player(&self, name: &str, connection: Connection) -> Result<u32, GameError> {
        let name = name.to_string();
        self.request(|response| GameCommand::AddPlayer {
            name,
            connection,
            response,
        })
        .await?
    }

    pub async fn reconnect_player(
        &self,
        player_id: u32,
        connection: Connection,
    ) -> Result<(), GameError> {
        self.request(|response| GameCommand::ReconnectPlayer {
            player_id,
            connection,
            response,
        })
        .await?
    }

    pub async fn is_joinable(&self) -> bool {
        self.request(|response| GameCommand::IsJoinable { response })
            .await
            .unwrap_or(false)
    }

    /// A match whose loop is gone counts as idle.
    pub async fn is_idle(&self) -> bool {
        self.request(|response| GameCommand::IsIdle { response })
            .await
            .unwrap_or(true)
    }

    pub async fn pretty_string(&self) -> Result<String, GameError> {
        self.request(|response| GameCommand::PrettyString { response })
            .await
    }

    pub async fn stop(&self) {
        // An already finished loop is as stopped as it gets
        let _ = self.request(|response| GameCommand::Stop { response }).await;
    }
}

/// Start the loop for `state` on the current runtime.
pub fn spawn_game(state: MatchState, config: LoopConfig) -> GameHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
    let handle = GameHandle {
        id: Arc::from(state.id()),
        cmd_tx,
    };
    tokio::spawn(run_game_loop(state, cmd_rx, config));
    handle
}

/// Run one match. This task is the only owner of `state`; ticks, commands and
/// player events are handled one at a time in arrival order.
pub async fn run_game_loop(
    mut state: MatchState,
    mut cmd_rx: mpsc::Receiver<GameCommand>,
    config: LoopConfig,
) {
    let (event_tx, mut event_rx) = mpsc::channel::<PlayerEvent>(EVENT_QUEUE);
    let (outbound_tx, _) = broadcast::channel::<OutboundFrame>(config.outbound_capacity);
    let mut pumps: HashMap<u32, PlayerPumps> = HashMap::new();
    let mut next_generation: u64 = 0;

    let mut tick_interval = tokio::time::interval(config.tick);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(game = %state.id(), "Game loop started");

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                state.tick();
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    // Every handle is gone
                    break;
                };
                match cmd {
                    GameCommand::AddPlayer { name, connection, response } => {
                        // Subscribe before the join messages are published
                        let outbound_rx = outbound_tx.subscribe();
                        match state.add_player(&name) {
                            Ok(player_id) => {
                                next_generation += 1;
                                let pump = PlayerPumps::spawn(
                                    player_id,
                                    next_generation,
                                    connection,
                                    event_tx.clone(),
                                    outbound_rx,
                                );
                                pumps.insert(player_id, pump);
                                let _ = response.send(Ok(player_id));
                            }
                            Err(e) => {
                                tracing::debug!(game = %state.id(), "Join refused: {}", e);
                                let _ = response.send(Err(e));
                            }
                        }
                    }
                    GameCommand::ReconnectPlayer { player_id, connection, response } => {
                        let outbound_rx = outbound_tx.subscribe();
                        match state.reconnect_player(player_id) {
                            Ok(()) => {
                                next_generation += 1;
                                // Replacing the entry drops, and so aborts, the stale pumps
                                let pump = PlayerPumps::spawn(
                                    player_id,
                                    next_generation,
                                    connection,
                                    event_tx.clone(),
                                    outbound_rx,
                                );
                                pumps.insert(player_id, pump);
                                let _ = response.send(Ok(()));
                            }
                            Err(e) => {
                                let _ = response.send(Err(e));
                            }
                        }
                    }
                    GameCommand::IsJoinable { response } => {
                        let _ = response.send(state.is_joinable());
                    }
                    GameCommand::IsIdle { response } => {
                        let _ = response.send(state.is_idle(Instant::now(), config.idle_timeout));
                    }
                    GameCommand::PrettyString { response } => {
                        let _ = response.send(state.pretty_string());
                    }
                    GameCommand::Stop { response } => {
                        state.stop();
                        let _ = response.send(());
                    }
                }
            }

            Some(event) = event_rx.recv() => {
                match event {
                    PlayerEvent::Message { player_id, msg } => {
                        state.handle_message(player_id, msg);
                    }
                    PlayerEvent::Disconnected { player_id, generation } => {
                        let current = pumps.get(&player_id).map(|p| p.generation);
                        if current == Some(generation) {
                            pumps.remove(&player_id);
                            state.disconnect_player(player_id);
                        } else {
                            tracing::debug!(
                                player_id,
                                generation,
                                "Ignoring disconnect of a replaced connection"
                            );
                        }
                    }
                }
            }
        }

        for out in state.drain_outbox() {
            match OutboundFrame::encode(&out) {
                Ok(frame) => {
                    // No subscribers is fine
                    let _ = outbound_tx.send(frame);
                }
                Err(e) => tracing::error!(game = %state.id(), "Failed to encode message: {}", e),
            }
        }

        for play in state.drain_plays() {
            let store = state.store();
            let game = state.id().to_string();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = store.record_play(&play.map_id, play.shots) {
                    let map = &play.map_id;
                    tracing::warn!(game = %game, map = %map, "Could not record play: {}", e);
                }
            });
        }

        if state.status() == MatchStatus::Stopped {
            break;
        }
    }

    state.stop();
    pumps.clear();
    tracing::info!(game = %state.id(), "Game loop ended");
}
