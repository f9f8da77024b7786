use super::memory::MemoryConversationStore;
use super::sqlite::SqliteConversationStore;
use super::store::{ConversationStore, StoreFuture};
use super::types::Conversation;
use crate::error::StoreError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Durable when the database answers a ping, in-memory otherwise.
///
/// The choice is made per operation. Conversations written in one mode are
/// not visible from the other.
pub struct DualModeStore {
    durable: Arc<SqliteConversationStore>,
    memory: MemoryConversationStore,
    degraded: AtomicBool,
}

impl DualModeStore {
    pub fn new(durable: Arc<SqliteConversationStore>) -> Self {
        Self {
            durable,
            memory: MemoryConversationStore::new(),
            degraded: AtomicBool::new(false),
        }
    }

    /// Backend for the next operation. Logs once per mode change.
    async fn backend(&self) -> &dyn ConversationStore {
        let available = self.durable.ping().await;
        let was_degraded = self.degraded.swap(!available, Ordering::AcqRel);

        match (available, was_degraded) {
            (false, false) => {
                tracing::warn!("durable store unreachable, switching to in-memory conversations");
            }
            (true, true) => {
                tracing::info!("durable store reachable again, leaving in-memory mode");
            }
            _ => {}
        }

        let backend: &dyn ConversationStore = if available {
            self.durable.as_ref()
        } else {
            &self.memory
        };
        backend
    }
}

impl ConversationStore for DualModeStore {
    fn find<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
    ) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(async move { self.backend().await.find(user_id, session_id).await })
    }

    fn find_by_session<'a>(&'a self, session_id: &'a str) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(async move { self.backend().await.find_by_session(session_id).await })
    }

    fn save<'a>(&'a self, conversation: &'a mut Conversation) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.backend().await.save(conversation).await })
    }

    fn list_by_user<'a>(
        &'a self,
        user_id: &'a str,
        session_id: Option<&'a str>,
    ) -> StoreFuture<'a, Vec<Conversation>> {
        Box::pin(async move { self.backend().await.list_by_user(user_id, session_id).await })
    }

    fn delete_all_for_user<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move { self.backend().await.delete_all_for_user(user_id).await })
    }

    fn all_conversations(&self) -> StoreFuture<'_, Vec<Conversation>> {
        Box::pin(async move { self.backend().await.all_conversations().await })
    }

    fn is_durable_available(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(self.durable.ping())
    }
}

/// Durable store with no in-memory fallback; unreachable means
/// [`StoreError::Unavailable`].
pub struct DurableOnlyStore {
    durable: Arc<SqliteConversationStore>,
}

impl DurableOnlyStore {
    pub fn new(durable: Arc<SqliteConversationStore>) -> Self {
        Self { durable }
    }

    async fn require(&self) -> Result<&SqliteConversationStore, StoreError> {
        if self.durable.ping().await {
            Ok(&self.durable)
        } else {
            Err(StoreError::Unavailable(
                "durable conversation store is not reachable".into(),
            ))
        }
    }
}

impl ConversationStore for DurableOnlyStore {
    fn find<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
    ) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(async move { self.require().await?.find(user_id, session_id).await })
    }

    fn find_by_session<'a>(&'a self, session_id: &'a str) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(async move { self.require().await?.find_by_session(session_id).await })
    }

    fn save<'a>(&'a self, conversation: &'a mut Conversation) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.require().await?.save(conversation).await })
    }

    fn list_by_user<'a>(
        &'a self,
        user_id: &'a str,
        session_id: Option<&'a str>,
    ) -> StoreFuture<'a, Vec<Conversation>> {
        Box::pin(async move { self.require().await?.list_by_user(user_id, session_id).await })
    }

    fn delete_all_for_user<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move { self.require().await?.delete_all_for_user(user_id).await })
    }

    fn all_conversations(&self) -> StoreFuture<'_, Vec<Conversation>> {
        Box::pin(async move { self.require().await?.all_conversations().await })
    }

    fn is_durable_available(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(self.durable.ping())
    }
}
