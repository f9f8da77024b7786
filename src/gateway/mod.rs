//! Axum-based HTTP gateway with the realtime WebSocket session hub.
//!
//! - REST endpoints for chat turns, sessions, history, analytics and the
//!   knowledge base
//! - `GET /ws` realtime sessions, broadcast per conversation
//! - Request body size limits (64KB max)
//! - Request timeouts (30s) to prevent slow-loris attacks
//! - CORS limited to the configured dashboard origins

mod events;
mod handlers;
mod hub;
mod server;
mod websocket;

pub use events::{ClientEvent, ServerEvent};
pub use hub::{SessionBinding, SessionHub};
pub use server::{build_app, run_gateway, run_gateway_with_listener};

use crate::config::Config;
use crate::error::StoreError;
use crate::knowledge::KnowledgeBase;
use crate::llm::AiFallbackClient;
use crate::router::{MessageRouter, TurnLocks};
use crate::session::{DualModeStore, DurableOnlyStore, SqliteConversationStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) — prevents slow-loris attacks
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    /// Request/response turns: durable store, in-memory while it is down.
    pub router: MessageRouter,
    /// Realtime turns: durable store only.
    pub realtime_router: MessageRouter,
    pub hub: Arc<SessionHub>,
}

impl AppState {
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        ai: Arc<AiFallbackClient>,
        durable: Arc<SqliteConversationStore>,
        locks: Arc<TurnLocks>,
    ) -> Self {
        let router = MessageRouter::new(
            Arc::new(DualModeStore::new(Arc::clone(&durable))),
            knowledge,
            ai,
            locks,
        );
        let realtime_router = router.with_store(Arc::new(DurableOnlyStore::new(durable)));

        Self {
            router,
            realtime_router,
            hub: Arc::new(SessionHub::new()),
        }
    }

    /// Wire every collaborator from `config`. The durable store is connected
    /// lazily: an unreachable database only means starting in-memory.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let knowledge = KnowledgeBase::load(config.knowledge.path.as_deref())
            .context("load knowledge base")?;
        tracing::info!(
            entries = knowledge.entries().len(),
            source = config
                .knowledge
                .path
                .as_deref()
                .map_or_else(|| "builtin".to_string(), |p| p.display().to_string()),
            "knowledge base loaded"
        );

        let ai = AiFallbackClient::from_config(&config.ai);
        let durable = SqliteConversationStore::connect_lazy(
            &config.store.database_url,
            Duration::from_millis(config.store.ping_timeout_ms),
        )
        .context("configure durable conversation store")?;

        if durable.ping().await {
            tracing::info!("durable conversation store connected");
        } else {
            if let Err(StoreError::Corrupt(reason)) = durable.ensure_schema().await {
                anyhow::bail!("durable conversation store is incompatible: {reason}");
            }
            tracing::warn!("durable conversation store unreachable, starting in in-memory mode");
        }

        Ok(Self::new(
            Arc::new(knowledge),
            Arc::new(ai),
            Arc::new(durable),
            Arc::new(TurnLocks::new(config.router.serialize_turns)),
        ))
    }
}
