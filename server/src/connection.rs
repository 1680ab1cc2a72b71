//! Player transport: a stream of inbound JSON frames and a sink for outbound
//! ones, plus the read/write pump tasks that connect it to a match.

use std::fmt;
use std::pin::Pin;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{sink, stream, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::protocol::{ClientMsg, OutboundFrame};

#[derive(Debug, Clone)]
pub struct TransportError(String);

impl TransportError {
    pub fn new(reason: impl fmt::Display) -> Self {
        TransportError(reason.to_string())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

pub type FrameStream = Pin<Box<dyn Stream<Item = String> + Send>>;
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

pub struct Connection {
    pub incoming: FrameStream,
    pub outgoing: FrameSink,
}

/// Test-side half of an in-memory connection.
pub struct RemoteEnd {
    pub to_server: mpsc::Sender<String>,
    pub from_server: mpsc::Receiver<String>,
}

impl Connection {
    pub fn new(incoming: FrameStream, outgoing: FrameSink) -> Self {
        Self { incoming, outgoing }
    }

    /// Text frames only; the stream ends on Close or on a socket error.
    pub fn from_websocket(socket: WebSocket) -> Self {
        let (ws_sink, ws_stream) = socket.split();

        let incoming = ws_stream
            .take_while(|msg| {
                let open = matches!(msg, Ok(m) if !matches!(m, Message::Close(_)));
                std::future::ready(open)
            })
            .filter_map(|msg| {
                std::future::ready(match msg {
                    Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                    _ => None,
                })
            });

        let outgoing = sink::unfold(ws_sink, |mut ws_sink, text: String| async move {
            ws_sink
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| TransportError::new(e))?;
            Ok::<_, TransportError>(ws_sink)
        });

        Self::new(Box::pin(incoming), Box::pin(outgoing))
    }

    /// Channel-backed connection for driving a match without sockets.
    pub fn in_memory(capacity: usize) -> (Self, RemoteEnd) {
        let (to_server, server_rx) = mpsc::channel::<String>(capacity);
        let (server_tx, from_server) = mpsc::channel::<String>(capacity);

        let incoming = stream::unfold(server_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });
        let outgoing = sink::unfold(server_tx, |tx, text: String| async move {
            tx.send(text)
                .await
                .map_err(|_| TransportError::new("peer closed"))?;
            Ok::<_, TransportError>(tx)
        });

        (
            Self::new(Box::pin(incoming), Box::pin(outgoing)),
            RemoteEnd {
                to_server,
                from_server,
            },
        )
    }
}

/// What the pumps report to their match.
#[derive(Debug)]
pub enum PlayerEvent {
    Message { player_id: u32, msg: ClientMsg },
    /// The connection with this generation is gone
    Disconnected { player_id: u32, generation: u64 },
}

/// The two tasks serving one player connection. Dropping the handle stops both.
pub struct PlayerPumps {
    pub generation: u64,
    read: JoinHandle<()>,
    write: JoinHandle<()>,
}

impl PlayerPumps {
    pub fn spawn(
        player_id: u32,
        generation: u64,
        connection: Connection,
        events: mpsc::Sender<PlayerEvent>,
        outbound: broadcast::Receiver<OutboundFrame>,
    ) -> Self {
        let Connection { incoming, outgoing } = connection;
        let read = tokio::spawn(read_pump(player_id, generation, incoming, events.clone()));
        let write = tokio::spawn(write_pump(player_id, generation, outgoing, outbound, events));
        Self {
            generation,
            read,
            write,
        }
    }

    pub fn abort(&self) {
        self.read.abort();
        self.write.abort();
    }
}

impl Drop for PlayerPumps {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn read_pump(
    player_id: u32,
    generation: u64,
    mut incoming: FrameStream,
    events: mpsc::Sender<PlayerEvent>,
) {
    while let Some(frame) = incoming.next().await {
        match serde_json::from_str::<ClientMsg>(&frame) {
            Ok(msg) => {
                if events
                    .send(PlayerEvent::Message { player_id, msg })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(player_id, "Dropping malformed frame: {}", e);
            }
        }
    }
    let _ = events
        .send(PlayerEvent::Disconnected {
            player_id,
            generation,
        })
        .await;
}

/// Forwards this player's frames in order. A lagging receiver has lost frames
/// for good, so the connection is closed and reported gone; the client
/// catches up by reconnecting.
async fn write_pump(
    player_id: u32,
    generation: u64,
    mut outgoing: FrameSink,
    mut outbound: broadcast::Receiver<OutboundFrame>,
    events: mpsc::Sender<PlayerEvent>,
) {
    loop {
        match outbound.recv().await {
            Ok(frame) => {
                if !frame.target.includes(player_id) {
                    continue;
                }
                if outgoing.send(frame.json.to_string()).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(player_id, "Closing connection that lagged by {} messages", n);
                break;
            }
            Err(broadcast::error::RecvError::Closed) => {
                let _ = outgoing.close().await;
                return;
            }
        }
    }
    let _ = outgoing.close().await;
    let _ = events
        .send(PlayerEvent::Disconnected {
            player_id,
            generation,
        })
        .await;
}
