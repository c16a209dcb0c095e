use serde::{Deserialize, Serialize};

/// Incoming WebSocket message from client
#[derive(Debug, Deserialize)]
pub struct WebSocketMessage {
    pub action: String,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Actions a connected client may send on `$default`
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebSocketAction {
    Ping,
    AcceptJob,
}

impl WebSocketAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "ping" => Some(WebSocketAction::Ping),
            "accept_job" => Some(WebSocketAction::AcceptJob),
            _ => None,
        }
    }
}

/// Broadcast message sent to a team's clients
#[derive(Debug, Serialize, Clone)]
pub struct BroadcastMessage {
    pub r#type: String,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl BroadcastMessage {
    pub fn new(message_type: &str, data: serde_json::Value) -> Self {
        Self {
            r#type: message_type.to_string(),
            data,
        }
    }
}
