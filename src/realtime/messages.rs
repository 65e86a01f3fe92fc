//! JSON frames exchanged on `/ws/desktop`, discriminated by `type`.

use serde::{Deserialize, Serialize};

pub const DB_CHANGED_TOPIC: &str = "db-changed";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Ping,
    Pong,
    #[serde(rename_all = "camelCase")]
    Identify { user_id: i64 },
    Subscribe {
        #[serde(default)]
        topics: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: String },
    Ping,
    Pong,
    #[serde(rename_all = "camelCase")]
    Identified { user_id: i64 },
    Subscribed { topics: Vec<String> },
    DbChanged { reason: String, at: String, seq: u64 },
    Error { message: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        // Serializing these enums cannot fail: no maps with non-string keys.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error"}"#.to_string())
    }
}

pub fn parse_client(text: &str) -> Result<ClientMessage, String> {
    serde_json::from_str(text).map_err(|e| format!("invalid message: {e}"))
}
