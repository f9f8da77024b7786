use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Provenance of a message, kept for analytics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Source {
    Kb,
    Ai,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub source: Source,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            source: Source::User,
            timestamp: now(),
        }
    }

    pub fn assistant(content: impl Into<String>, source: Source) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            source,
            timestamp: now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub ai_calls_count: u64,
    pub kb_hits_count: u64,
    pub total_messages: u64,
}

/// One chat thread, owned by its `(user_id, session_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub messages: Vec<Message>,
    #[serde(rename = "metadata")]
    pub counters: Counters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Empty conversation with zeroed counters. Not persisted.
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        let created_at = now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            messages: Vec::new(),
            counters: Counters::default(),
            created_at,
            updated_at: created_at,
        }
    }

    /// Append in chronological order. A timestamp earlier than the current
    /// tail is raised to the tail's so the sequence never goes backwards.
    pub fn append(&mut self, mut message: Message) {
        if let Some(last) = self.messages.last()
            && message.timestamp < last.timestamp
        {
            message.timestamp = last.timestamp;
        }
        self.messages.push(message);
        self.touch();
    }

    /// Refresh `updated_at` and recompute `total_messages` from the list.
    pub fn touch(&mut self) {
        self.counters.total_messages = self.messages.len() as u64;
        let stamp = now();
        self.updated_at = stamp.max(self.updated_at);
    }

    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(&self.user_id, &self.session_id)
    }

    pub fn assistant_message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count()
    }
}

/// Identity of one conversation. Compared field by field, since ids are
/// client-supplied and may contain any separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub user_id: String,
    pub session_id: String,
}

impl ConversationKey {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.user_id, self.session_id)
    }
}

/// Current time at the precision the durable store keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
