use super::types::Conversation;
use crate::error::StoreError;
use std::future::Future;
use std::pin::Pin;

/// Maximum conversations returned by a history listing.
pub const HISTORY_LIMIT: usize = 10;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Async conversation persistence contract.
///
/// Backends differ only in durability; the router holds a
/// `dyn ConversationStore` and never learns which one it has.
pub trait ConversationStore: Send + Sync {
    fn find<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
    ) -> StoreFuture<'a, Option<Conversation>>;

    /// Lookup by session id alone, whichever user owns it.
    fn find_by_session<'a>(&'a self, session_id: &'a str) -> StoreFuture<'a, Option<Conversation>>;

    /// Empty conversation for the pair. Nothing is written until `save`.
    fn create(&self, user_id: &str, session_id: &str) -> Conversation {
        Conversation::new(user_id, session_id)
    }

    /// Persist the whole conversation. `updated_at` and `total_messages`
    /// are recomputed here and written back into `conversation`.
    fn save<'a>(&'a self, conversation: &'a mut Conversation) -> StoreFuture<'a, ()>;

    /// Newest-updated first, at most [`HISTORY_LIMIT`] entries.
    fn list_by_user<'a>(
        &'a self,
        user_id: &'a str,
        session_id: Option<&'a str>,
    ) -> StoreFuture<'a, Vec<Conversation>>;

    fn delete_all_for_user<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, u64>;

    /// Every conversation, for analytics.
    fn all_conversations(&self) -> StoreFuture<'_, Vec<Conversation>>;

    /// Whether the durable backend is reachable right now.
    fn is_durable_available(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}
