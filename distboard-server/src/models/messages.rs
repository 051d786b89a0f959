//! WebSocket message types for real-time streaming

use distboard::dash::{DashboardView, UiAction};
use serde::{Deserialize, Serialize};

/// Messages sent from server to clients
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { seq: u64, session_id: String },

    /// Full dashboard state after a change
    Snapshot { seq: u64, dashboard: DashboardView },

    /// A rejected action; the last snapshot stays valid
    Error { seq: u64, kind: String, message: String },
}

/// Messages sent from clients to server
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Apply a user interaction
    Action { action: UiAction },

    /// Client requests current state
    GetState,

    /// Acknowledge receipt of a message
    Ack { seq: u64 },
}

/// Update pushed to every client of a session
#[derive(Clone, Debug)]
pub enum UpdateCommand {
    Snapshot(DashboardView),
    Error { kind: String, message: String },
}

impl UpdateCommand {
    /// Convert to a server message with sequence number
    pub fn to_server_message(&self, seq: u64) -> ServerMessage {
        match self {
            UpdateCommand::Snapshot(dashboard) => ServerMessage::Snapshot {
                seq,
                dashboard: dashboard.clone(),
            },
            UpdateCommand::Error { kind, message } => ServerMessage::Error {
                seq,
                kind: kind.clone(),
                message: message.clone(),
            },
        }
    }
}
