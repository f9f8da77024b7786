//! One user-message-in, assistant-reply-out cycle.
//!
//! A turn appends the user message, answers from the knowledge base when a
//! keyword matches, otherwise from the AI fallback (or a static redirect when
//! no AI is configured), appends the reply, updates counters and persists.

mod locks;

pub use locks::TurnLocks;

use crate::error::{FallbackError, NOT_CONFIGURED_REPLY, RouterError};
use crate::knowledge::KnowledgeBase;
use crate::llm::{AiFallbackClient, CONTEXT_WINDOW, ChatMessage, ChatRole, SYSTEM_PROMPT};
use crate::session::{Conversation, ConversationKey, ConversationStore, Message, Role, Source};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const WELCOME_MESSAGE: &str = "👋 Hello! Welcome to our support chat. I'm here to help you with any questions about our product, pricing, account issues, or technical support. How can I assist you today?";

/// How the caller receives the outcome; decides what a failed save means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnTransport {
    /// Request/response: a failed save fails the turn.
    Request,
    /// Pushed events: a failed save is logged and the reply still goes out.
    Realtime,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Where a reply really came from. `source` on the wire is coarser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOrigin {
    KnowledgeBase { key: String },
    Ai,
    AiFailure { kind: &'static str },
    /// No AI configured; tagged `kb` on the wire but counts as neither.
    StaticFallback,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReply {
    pub reply: String,
    pub source: Source,
    pub user_id: String,
    pub session_id: String,
    pub message_count: usize,
    #[serde(skip)]
    pub persisted: bool,
    #[serde(skip)]
    pub origin: ReplyOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub session_id: String,
    pub user_id: String,
    pub welcome_message: String,
}

/// Client-supplied id when present and non-blank, a fresh UUID otherwise.
pub fn resolve_id(candidate: Option<String>) -> String {
    candidate
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[derive(Clone)]
pub struct MessageRouter {
    store: Arc<dyn ConversationStore>,
    knowledge: Arc<KnowledgeBase>,
    ai: Arc<AiFallbackClient>,
    locks: Arc<TurnLocks>,
}

impl MessageRouter {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        knowledge: Arc<KnowledgeBase>,
        ai: Arc<AiFallbackClient>,
        locks: Arc<TurnLocks>,
    ) -> Self {
        Self {
            store,
            knowledge,
            ai,
            locks,
        }
    }

    /// Same knowledge base, AI client and turn locks over a different store.
    pub fn with_store(&self, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            knowledge: Arc::clone(&self.knowledge),
            ai: Arc::clone(&self.ai),
            locks: Arc::clone(&self.locks),
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn ai(&self) -> &AiFallbackClient {
        &self.ai
    }

    pub async fn handle_turn(
        &self,
        request: TurnRequest,
        transport: TurnTransport,
    ) -> Result<TurnReply, RouterError> {
        let text = request.message.trim();
        if text.is_empty() {
            return Err(RouterError::EmptyMessage);
        }

        let user_id = resolve_id(request.user_id);
        let session_id = resolve_id(request.session_id);
        let _turn = self
            .locks
            .acquire(&ConversationKey::new(user_id.as_str(), session_id.as_str()))
            .await;

        let mut conversation = match self.store.find(&user_id, &session_id).await? {
            Some(conversation) => conversation,
            None => self.store.create(&user_id, &session_id),
        };

        conversation.append(Message::user(text));
        let (reply, source, origin) = self.resolve_reply(&mut conversation, text).await;
        conversation.append(Message::assistant(reply.clone(), source));

        tracing::debug!(
            user_id = %user_id,
            session_id = %session_id,
            origin = ?origin,
            "turn resolved"
        );

        let persisted = match self.store.save(&mut conversation).await {
            Ok(()) => true,
            Err(error) => {
                tracing::error!(
                    user_id = %user_id,
                    session_id = %session_id,
                    error = %error,
                    transport = ?transport,
                    "failed to persist conversation"
                );
                if transport == TurnTransport::Request {
                    return Err(RouterError::PersistenceFailed(error));
                }
                false
            }
        };

        Ok(TurnReply {
            reply,
            source,
            user_id,
            session_id,
            message_count: conversation.messages.len(),
            persisted,
            origin,
        })
    }

    async fn resolve_reply(
        &self,
        conversation: &mut Conversation,
        text: &str,
    ) -> (String, Source, ReplyOrigin) {
        if let Some(hit) = self.knowledge.find_match(text) {
            conversation.counters.kb_hits_count += 1;
            return (
                hit.response.to_string(),
                Source::Kb,
                ReplyOrigin::KnowledgeBase {
                    key: hit.key.to_string(),
                },
            );
        }

        if !self.ai.is_configured() {
            return static_fallback();
        }

        match self.ai.complete(&context_window(conversation), SYSTEM_PROMPT).await {
            Ok(completion) => {
                conversation.counters.ai_calls_count += 1;
                (completion.content, Source::Ai, ReplyOrigin::Ai)
            }
            Err(FallbackError::NotConfigured) => static_fallback(),
            Err(error) => {
                conversation.counters.ai_calls_count += 1;
                (
                    error.reply().to_string(),
                    Source::Ai,
                    ReplyOrigin::AiFailure { kind: error.kind() },
                )
            }
        }
    }

    /// Fresh session seeded with the welcome message.
    pub async fn create_session(&self, user_id: Option<String>) -> Result<SessionStart, RouterError> {
        let user_id = resolve_id(user_id);
        let session_id = Uuid::new_v4().to_string();

        let mut conversation = self.store.create(&user_id, &session_id);
        conversation.append(Message::assistant(WELCOME_MESSAGE, Source::Kb));
        self.store.save(&mut conversation).await.inspect_err(|error| {
            tracing::error!(user_id = %user_id, error = %error, "failed to create session");
        })?;

        tracing::info!(user_id = %user_id, session_id = %session_id, "session created");
        Ok(SessionStart {
            session_id,
            user_id,
            welcome_message: WELCOME_MESSAGE.to_string(),
        })
    }

    pub async fn get_history(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Vec<Conversation>, RouterError> {
        Ok(self.store.list_by_user(user_id, session_id).await?)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Conversation, RouterError> {
        self.store
            .find_by_session(session_id)
            .await?
            .ok_or_else(|| RouterError::NotFound("Session".into()))
    }

    pub async fn clear_history(&self, user_id: &str) -> Result<u64, RouterError> {
        let deleted = self.store.delete_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, deleted, "history cleared");
        Ok(deleted)
    }
}

fn static_fallback() -> (String, Source, ReplyOrigin) {
    (
        NOT_CONFIGURED_REPLY.to_string(),
        Source::Kb,
        ReplyOrigin::StaticFallback,
    )
}

/// Most recent messages in provider form, oldest first.
fn context_window(conversation: &Conversation) -> Vec<ChatMessage> {
    let start = conversation.messages.len().saturating_sub(CONTEXT_WINDOW);
    conversation.messages[start..]
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::User => ChatRole::User,
                Role::Assistant => ChatRole::Assistant,
                Role::System => ChatRole::System,
            };
            ChatMessage::new(role, message.content.clone())
        })
        .collect()
}
