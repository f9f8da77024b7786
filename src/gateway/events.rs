use crate::session::{Message, Role, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    InitSession {
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },
    SendMessage {
        #[serde(default)]
        message: String,
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },
    UserTyping {
        #[serde(default)]
        is_typing: bool,
    },
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Connected {
        connection_id: String,
        version: String,
    },
    SessionInitialized {
        user_id: String,
        session_id: String,
    },
    ReceiveMessage {
        role: Role,
        content: String,
        source: Source,
        timestamp: DateTime<Utc>,
        /// Sender of a user message, so session peers can tell speakers apart.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    Typing {
        is_typing: bool,
    },
    UserTyping {
        user_id: String,
        is_typing: bool,
    },
    Error {
        message: String,
    },
    Pong,
}

impl ServerEvent {
    pub fn connected(connection_id: impl Into<String>) -> Self {
        Self::Connected {
            connection_id: connection_id.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn receive(message: &Message) -> Self {
        Self::ReceiveMessage {
            role: message.role,
            content: message.content.clone(),
            source: message.source,
            timestamp: message.timestamp,
            user_id: None,
        }
    }

    /// A user message echoed to the session, tagged with who sent it.
    pub fn receive_from(message: &Message, user_id: impl Into<String>) -> Self {
        Self::ReceiveMessage {
            role: message.role,
            content: message.content.clone(),
            source: message.source,
            timestamp: message.timestamp,
            user_id: Some(user_id.into()),
        }
    }

    pub fn typing(is_typing: bool) -> Self {
        Self::Typing { is_typing }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","message":"serialization failed"}"#.to_string())
    }
}
