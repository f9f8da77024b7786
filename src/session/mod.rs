pub mod dual;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod types;

pub use dual::{DualModeStore, DurableOnlyStore};
pub use memory::MemoryConversationStore;
pub use sqlite::SqliteConversationStore;
pub use store::{ConversationStore, HISTORY_LIMIT, StoreFuture};
pub use types::{Conversation, ConversationKey, Counters, Message, Role, Source};
