//! WebSocket streaming handlers

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::api::sessions::{broadcast_snapshot, require_session, run_action};
use crate::models::{ClientMessage, ServerMessage, UpdateCommand};
use crate::storage::SessionStore;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast state of one session: sender, sequence counter and the
/// number of open sockets.
struct SessionChannel {
    sender: broadcast::Sender<ServerMessage>,
    seq: AtomicU64,
    clients: AtomicU64,
}

impl SessionChannel {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            seq: AtomicU64::new(0),
            clients: AtomicU64::new(0),
        }
    }
}

/// Per-session fan-out to connected sockets
#[derive(Default)]
pub struct BroadcastHub {
    channels: DashMap<Uuid, SessionChannel>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, creating the session's channel on first use
    pub fn subscribe(&self, id: Uuid) -> broadcast::Receiver<ServerMessage> {
        let channel = self.channels.entry(id).or_insert_with(SessionChannel::new);
        channel.clients.fetch_add(1, Ordering::Relaxed);
        channel.sender.subscribe()
    }

    pub fn unsubscribe(&self, id: Uuid) {
        if let Some(channel) = self.channels.get(&id) {
            channel.clients.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Stamp `cmd` with the session's next sequence number and send it.
    /// Sessions nobody listens to are skipped.
    pub fn broadcast(&self, id: Uuid, cmd: UpdateCommand) {
        if let Some(channel) = self.channels.get(&id) {
            let seq = channel.seq.fetch_add(1, Ordering::Relaxed) + 1;
            // no receivers is fine
            let _ = channel.sender.send(cmd.to_server_message(seq));
        }
    }

    pub fn remove_session(&self, id: Uuid) {
        self.channels.remove(&id);
    }

    /// Sessions with at least one open socket; cleanup skips these
    pub fn active_session_ids(&self) -> Vec<Uuid> {
        self.channels
            .iter()
            .filter(|entry| entry.value().clients.load(Ordering::Relaxed) > 0)
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn connection_count(&self, id: Uuid) -> u64 {
        self.channels
            .get(&id)
            .map_or(0, |channel| channel.clients.load(Ordering::Relaxed))
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, id, socket))
}

/// Handle a WebSocket connection
async fn handle_socket(state: Arc<AppState>, session_id: Uuid, socket: WebSocket) {
    let session = match require_session(&state, session_id).await {
        Ok(session) => session,
        Err(e) => {
            warn!("WebSocket connection for unknown session {}: {}", session_id, e);
            return;
        }
    };
    info!(
        "WebSocket connected for session {} ({} clients)",
        session_id,
        state.broadcast_hub.connection_count(session_id) + 1
    );

    let _ = state.store.touch(session_id).await;

    // Subscribe before the first snapshot so no update is missed
    let mut rx = state.broadcast_hub.subscribe(session_id);
    let (mut sender, mut receiver) = socket.split();

    let connected_msg = ServerMessage::Connected {
        seq: 0,
        session_id: session_id.to_string(),
    };
    if let Ok(json) = serde_json::to_string(&connected_msg) {
        let _ = sender.send(Message::Text(json.into())).await;
    }
    broadcast_snapshot(&state, &session);

    // Forward broadcast messages to the client
    let forward_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // snapshots are full state, so the next one catches up
                    warn!("Client lagged, skipped {} messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Handle incoming messages from the client
    let state_clone = Arc::clone(&state);
    let receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Action { action }) => {
                        debug!("Client action {:?}", action);
                        // failures are broadcast as error messages
                        let _ = run_action(&state_clone, &session, action).await;
                    }
                    Ok(ClientMessage::GetState) => {
                        debug!("Client requesting state");
                        broadcast_snapshot(&state_clone, &session);
                    }
                    Ok(ClientMessage::Ack { seq }) => {
                        debug!("Client acked seq {}", seq);
                    }
                    Err(e) => {
                        warn!("Invalid client message: {}", e);
                    }
                },
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = forward_task => {}
        _ = receive_task => {}
    }

    state.broadcast_hub.unsubscribe(session_id);
    info!("WebSocket disconnected for session {}", session_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_subscribers_in_order() {
        let hub = BroadcastHub::new();
        let id = Uuid::new_v4();
        let mut rx = hub.subscribe(id);
        assert_eq!(hub.active_session_ids(), vec![id]);

        for message in ["first", "second"] {
            hub.broadcast(
                id,
                UpdateCommand::Error {
                    kind: "domain".into(),
                    message: message.into(),
                },
            );
        }
        let seqs: Vec<u64> = [rx.recv().await.unwrap(), rx.recv().await.unwrap()]
            .into_iter()
            .map(|m| match m {
                ServerMessage::Error { seq, .. } => seq,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(seqs, vec![1, 2]);

        hub.unsubscribe(id);
        assert!(hub.active_session_ids().is_empty());
        assert_eq!(hub.connection_count(id), 0);
    }

    #[test]
    fn broadcast_without_channel_is_dropped() {
        let hub = BroadcastHub::new();
        let id = Uuid::new_v4();
        hub.broadcast(
            id,
            UpdateCommand::Error {
                kind: "binding".into(),
                message: "nobody listening".into(),
            },
        );
        assert_eq!(hub.connection_count(id), 0);
    }
}
