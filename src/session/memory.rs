use super::store::{ConversationStore, HISTORY_LIMIT, StoreFuture};
use super::types::{Conversation, ConversationKey, now};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::RwLock;

/// Process-local store used while the durable backend is unreachable.
/// Contents are lost on restart and never migrated.
#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: RwLock<HashMap<ConversationKey, Conversation>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}

fn newest_first(mut conversations: Vec<Conversation>) -> Vec<Conversation> {
    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    conversations
}

impl ConversationStore for MemoryConversationStore {
    fn find<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
    ) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(async move {
            let conversations = self.conversations.read().await;
            Ok(conversations
                .get(&ConversationKey::new(user_id, session_id))
                .cloned())
        })
    }

    fn find_by_session<'a>(&'a self, session_id: &'a str) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(async move {
            let conversations = self.conversations.read().await;
            Ok(conversations
                .values()
                .filter(|c| c.session_id == session_id)
                .max_by_key(|c| c.updated_at)
                .cloned())
        })
    }

    fn save<'a>(&'a self, conversation: &'a mut Conversation) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            conversation.counters.total_messages = conversation.messages.len() as u64;
            conversation.updated_at = now().max(conversation.updated_at);

            let mut conversations = self.conversations.write().await;
            conversations.insert(conversation.key(), conversation.clone());
            Ok(())
        })
    }

    fn list_by_user<'a>(
        &'a self,
        user_id: &'a str,
        session_id: Option<&'a str>,
    ) -> StoreFuture<'a, Vec<Conversation>> {
        Box::pin(async move {
            let conversations = self.conversations.read().await;
            let matching = conversations
                .values()
                .filter(|c| c.user_id == user_id)
                .filter(|c| session_id.is_none_or(|s| c.session_id == s))
                .cloned()
                .collect();

            let mut listed = newest_first(matching);
            listed.truncate(HISTORY_LIMIT);
            Ok(listed)
        })
    }

    fn delete_all_for_user<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let mut conversations = self.conversations.write().await;
            let before = conversations.len();
            conversations.retain(|_, c| c.user_id != user_id);
            Ok((before - conversations.len()) as u64)
        })
    }

    fn all_conversations(&self) -> StoreFuture<'_, Vec<Conversation>> {
        Box::pin(async move {
            let conversations = self.conversations.read().await;
            Ok(newest_first(conversations.values().cloned().collect()))
        })
    }

    fn is_durable_available(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async { false })
    }
}
