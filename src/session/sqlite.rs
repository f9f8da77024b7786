use super::store::{ConversationStore, HISTORY_LIMIT, StoreFuture};
use super::types::{Conversation, Counters, Message, now};
use crate::error::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;

const SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS helpline_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const SCHEMA_VERSION_KEY: &str = "conversation_schema_version";
const SCHEMA_VERSION: u32 = 1;

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const CONVERSATION_COLUMNS: &str = "id, user_id, session_id, ai_calls_count, kb_hits_count, \
total_messages, created_at, updated_at";

/// SQLite-backed durable conversation store.
///
/// The pool connects lazily, so construction succeeds even when the database
/// cannot be opened yet. Schema setup runs on first use and is retried until
/// it succeeds once.
pub struct SqliteConversationStore {
    pool: SqlitePool,
    ping_timeout: Duration,
    schema: OnceCell<()>,
}

async fn ensure_schema_version(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(SCHEMA_META_TABLE).execute(pool).await?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM helpline_schema_meta WHERE key = $1")
            .bind(SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await?;

    if let Some((value,)) = stored_version {
        let parsed = value
            .parse::<u32>()
            .map_err(|_| StoreError::Corrupt(format!("invalid schema version value: {value}")))?;
        if parsed != SCHEMA_VERSION {
            return Err(StoreError::Corrupt(format!(
                "incompatible conversation schema version: stored={parsed}, expected={SCHEMA_VERSION}"
            )));
        }
        return Ok(());
    }

    sqlx::query("INSERT INTO helpline_schema_meta (key, value) VALUES ($1, $2)")
        .bind(SCHEMA_VERSION_KEY)
        .bind(SCHEMA_VERSION.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    ensure_schema_version(pool).await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS conversations (
             id TEXT PRIMARY KEY,
             user_id TEXT NOT NULL,
             session_id TEXT NOT NULL,
             ai_calls_count INTEGER NOT NULL DEFAULT 0,
             kb_hits_count INTEGER NOT NULL DEFAULT 0,
             total_messages INTEGER NOT NULL DEFAULT 0,
             created_at TEXT NOT NULL,
             updated_at TEXT NOT NULL,
             UNIQUE(user_id, session_id)
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS conversation_messages (
             conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
             position INTEGER NOT NULL,
             role TEXT NOT NULL,
             content TEXT NOT NULL,
             source TEXT NOT NULL,
             timestamp TEXT NOT NULL,
             PRIMARY KEY (conversation_id, position)
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_conversations_user_updated
             ON conversations(user_id, updated_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_conversations_session ON conversations(session_id)")
        .execute(pool)
        .await?;

    Ok(())
}

fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp {raw}: {e}")))
}

fn parse_count(row: &SqliteRow, column: &str) -> Result<u64, StoreError> {
    let raw: i64 = row.try_get(column)?;
    u64::try_from(raw).map_err(|_| StoreError::Corrupt(format!("negative {column}: {raw}")))
}

fn to_db_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn map_conversation_row(row: &SqliteRow) -> Result<Conversation, StoreError> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Conversation {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        session_id: row.try_get("session_id")?,
        messages: Vec::new(),
        counters: Counters {
            ai_calls_count: parse_count(row, "ai_calls_count")?,
            kb_hits_count: parse_count(row, "kb_hits_count")?,
            total_messages: parse_count(row, "total_messages")?,
        },
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

fn map_message_row(row: &SqliteRow) -> Result<Message, StoreError> {
    let role: String = row.try_get("role")?;
    let source: String = row.try_get("source")?;
    let timestamp: String = row.try_get("timestamp")?;

    Ok(Message {
        role: FromStr::from_str(&role)
            .map_err(|_| StoreError::Corrupt(format!("unknown message role: {role}")))?,
        content: row.try_get("content")?,
        source: FromStr::from_str(&source)
            .map_err(|_| StoreError::Corrupt(format!("unknown message source: {source}")))?,
        timestamp: parse_time(&timestamp)?,
    })
}

impl SqliteConversationStore {
    /// Lazily connected store for `database_url`. Fails only on a malformed URL.
    pub fn connect_lazy(database_url: &str, ping_timeout: Duration) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(database_url)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self::from_pool(pool, ping_timeout))
    }

    /// Wrap an existing pool. The schema is created on first use.
    pub fn from_pool(pool: SqlitePool, ping_timeout: Duration) -> Self {
        Self {
            pool,
            ping_timeout,
            schema: OnceCell::new(),
        }
    }

    /// Create tables if needed. Idempotent; a failed attempt is retried on
    /// the next call.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.schema
            .get_or_try_init(|| create_schema(&self.pool))
            .await?;
        Ok(())
    }

    /// `SELECT 1` bounded by the ping timeout, followed by schema setup.
    pub async fn ping(&self) -> bool {
        let select_one = sqlx::query("SELECT 1").execute(&self.pool);
        match tokio::time::timeout(self.ping_timeout, select_one).await {
            Ok(Ok(_)) => match self.ensure_schema().await {
                Ok(()) => true,
                Err(error) => {
                    tracing::error!(error = %error, "conversation schema setup failed");
                    false
                }
            },
            Ok(Err(error)) => {
                tracing::debug!(error = %error, "durable store ping failed");
                false
            }
            Err(_) => {
                tracing::debug!(
                    timeout_ms = self.ping_timeout.as_millis() as u64,
                    "durable store ping timed out"
                );
                false
            }
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn ready(&self) -> Result<&SqlitePool, StoreError> {
        self.ensure_schema().await?;
        Ok(&self.pool)
    }

    async fn load_messages(
        pool: &SqlitePool,
        conversation_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT role, content, source, timestamp
             FROM conversation_messages
             WHERE conversation_id = $1
             ORDER BY position ASC",
        )
        .bind(conversation_id)
        .fetch_all(pool)
        .await?;

        rows.iter().map(map_message_row).collect()
    }

    async fn hydrate(
        pool: &SqlitePool,
        row: Option<SqliteRow>,
    ) -> Result<Option<Conversation>, StoreError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut conversation = map_conversation_row(&row)?;
        conversation.messages = Self::load_messages(pool, &conversation.id).await?;
        Ok(Some(conversation))
    }

    async fn save_conversation(&self, conversation: &mut Conversation) -> Result<(), StoreError> {
        let pool = self.ready().await?;

        conversation.counters.total_messages = conversation.messages.len() as u64;
        conversation.updated_at = now().max(conversation.updated_at);

        let mut tx = pool.begin().await?;

        let (stored_id,): (String,) = sqlx::query_as(
            "INSERT INTO conversations
                 (id, user_id, session_id, ai_calls_count, kb_hits_count, total_messages, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT(user_id, session_id) DO UPDATE SET
                 ai_calls_count = excluded.ai_calls_count,
                 kb_hits_count = excluded.kb_hits_count,
                 total_messages = excluded.total_messages,
                 updated_at = excluded.updated_at
             RETURNING id",
        )
        .bind(&conversation.id)
        .bind(&conversation.user_id)
        .bind(&conversation.session_id)
        .bind(to_db_count(conversation.counters.ai_calls_count))
        .bind(to_db_count(conversation.counters.kb_hits_count))
        .bind(to_db_count(conversation.counters.total_messages))
        .bind(format_time(conversation.created_at))
        .bind(format_time(conversation.updated_at))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM conversation_messages WHERE conversation_id = $1")
            .bind(&stored_id)
            .execute(&mut *tx)
            .await?;

        for (position, message) in conversation.messages.iter().enumerate() {
            sqlx::query(
                "INSERT INTO conversation_messages
                     (conversation_id, position, role, content, source, timestamp)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&stored_id)
            .bind(to_db_count(position as u64))
            .bind(message.role.as_ref())
            .bind(&message.content)
            .bind(message.source.as_ref())
            .bind(format_time(message.timestamp))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        conversation.id = stored_id;
        Ok(())
    }
}

impl ConversationStore for SqliteConversationStore {
    fn find<'a>(
        &'a self,
        user_id: &'a str,
        session_id: &'a str,
    ) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(async move {
            let pool = self.ready().await?;
            let row = sqlx::query(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE user_id = $1 AND session_id = $2"
            ))
            .bind(user_id)
            .bind(session_id)
            .fetch_optional(pool)
            .await?;

            Self::hydrate(pool, row).await
        })
    }

    fn find_by_session<'a>(&'a self, session_id: &'a str) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(async move {
            let pool = self.ready().await?;
            let row = sqlx::query(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE session_id = $1
                 ORDER BY updated_at DESC
                 LIMIT 1"
            ))
            .bind(session_id)
            .fetch_optional(pool)
            .await?;

            Self::hydrate(pool, row).await
        })
    }

    fn save<'a>(&'a self, conversation: &'a mut Conversation) -> StoreFuture<'a, ()> {
        Box::pin(self.save_conversation(conversation))
    }

    fn list_by_user<'a>(
        &'a self,
        user_id: &'a str,
        session_id: Option<&'a str>,
    ) -> StoreFuture<'a, Vec<Conversation>> {
        Box::pin(async move {
            let pool = self.ready().await?;
            let limit = HISTORY_LIMIT as i64;

            let rows = if let Some(session_id) = session_id {
                sqlx::query(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations
                     WHERE user_id = $1 AND session_id = $2
                     ORDER BY updated_at DESC
                     LIMIT $3"
                ))
                .bind(user_id)
                .bind(session_id)
                .bind(limit)
                .fetch_all(pool)
                .await?
            } else {
                sqlx::query(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations
                     WHERE user_id = $1
                     ORDER BY updated_at DESC
                     LIMIT $2"
                ))
                .bind(user_id)
                .bind(limit)
                .fetch_all(pool)
                .await?
            };

            let mut conversations = Vec::with_capacity(rows.len());
            for row in rows {
                let mut conversation = map_conversation_row(&row)?;
                conversation.messages = Self::load_messages(pool, &conversation.id).await?;
                conversations.push(conversation);
            }
            Ok(conversations)
        })
    }

    fn delete_all_for_user<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let pool = self.ready().await?;
            let mut tx = pool.begin().await?;

            sqlx::query(
                "DELETE FROM conversation_messages
                 WHERE conversation_id IN (SELECT id FROM conversations WHERE user_id = $1)",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            let result = sqlx::query("DELETE FROM conversations WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(result.rows_affected())
        })
    }

    fn all_conversations(&self) -> StoreFuture<'_, Vec<Conversation>> {
        Box::pin(async move {
            let pool = self.ready().await?;

            let rows = sqlx::query(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY updated_at DESC"
            ))
            .fetch_all(pool)
            .await?;

            let message_rows = sqlx::query(
                "SELECT conversation_id, role, content, source, timestamp
                 FROM conversation_messages
                 ORDER BY conversation_id, position ASC",
            )
            .fetch_all(pool)
            .await?;

            let mut messages: HashMap<String, Vec<Message>> = HashMap::new();
            for row in &message_rows {
                let conversation_id: String = row.try_get("conversation_id")?;
                messages
                    .entry(conversation_id)
                    .or_default()
                    .push(map_message_row(row)?);
            }

            rows.iter()
                .map(|row| {
                    let mut conversation = map_conversation_row(row)?;
                    conversation.messages = messages.remove(&conversation.id).unwrap_or_default();
                    Ok(conversation)
                })
                .collect()
        })
    }

    fn is_durable_available(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(self.ping())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::Source;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteConversationStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteConversationStore::from_pool(pool, Duration::from_millis(500))
    }

    fn conversation_with_turn(user: &str, session: &str) -> Conversation {
        let mut conversation = Conversation::new(user, session);
        conversation.append(Message::user("What is your refund policy?"));
        conversation.append(Message::assistant("Refund Policy ...", Source::Kb));
        conversation.counters.kb_hits_count = 1;
        conversation
    }

    #[tokio::test]
    async fn save_then_find_round_trips_messages_and_counters() {
        let store = store().await;
        let mut conversation = conversation_with_turn("u1", "s1");
        store.save(&mut conversation).await.unwrap();

        let loaded = store.find("u1", "s1").await.unwrap().unwrap();
        assert_eq!(loaded, conversation);
        assert_eq!(loaded.counters.total_messages, 2);
        assert_eq!(loaded.messages[1].source, Source::Kb);
    }

    #[tokio::test]
    async fn find_returns_none_for_unknown_pair() {
        let store = store().await;
        assert!(store.find("nobody", "nothing").await.unwrap().is_none());
        assert!(store.find_by_session("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_recomputes_total_messages() {
        let store = store().await;
        let mut conversation = conversation_with_turn("u1", "s1");
        conversation.counters.total_messages = 99;

        store.save(&mut conversation).await.unwrap();

        assert_eq!(conversation.counters.total_messages, 2);
        let loaded = store.find("u1", "s1").await.unwrap().unwrap();
        assert_eq!(loaded.counters.total_messages, 2);
    }

    #[tokio::test]
    async fn resave_replaces_message_list() {
        let store = store().await;
        let mut conversation = conversation_with_turn("u1", "s1");
        store.save(&mut conversation).await.unwrap();

        conversation.append(Message::user("thanks"));
        conversation.append(Message::assistant("You're welcome!", Source::Kb));
        store.save(&mut conversation).await.unwrap();

        let loaded = store.find("u1", "s1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 4);
        assert_eq!(loaded.messages[2].content, "thanks");
    }

    #[tokio::test]
    async fn saving_a_second_copy_of_a_pair_keeps_the_original_id() {
        let store = store().await;
        let mut first = conversation_with_turn("u1", "s1");
        store.save(&mut first).await.unwrap();

        let mut second = Conversation::new("u1", "s1");
        second.append(Message::user("other"));
        store.save(&mut second).await.unwrap();

        assert_eq!(second.id, first.id);
        let loaded = store.find("u1", "s1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
    }

    #[tokio::test]
    async fn list_by_user_is_newest_first_and_capped() {
        let store = store().await;
        for i in 0..12 {
            let mut conversation = Conversation::new("u1", format!("s{i}"));
            conversation.append(Message::user(format!("message {i}")));
            store.save(&mut conversation).await.unwrap();
        }
        let mut other = Conversation::new("u2", "s0");
        store.save(&mut other).await.unwrap();

        let listed = store.list_by_user("u1", None).await.unwrap();
        assert_eq!(listed.len(), HISTORY_LIMIT);
        assert!(listed.windows(2).all(|w| w[0].updated_at >= w[1].updated_at));
        assert!(listed.iter().all(|c| c.user_id == "u1"));

        let filtered = store.list_by_user("u1", Some("s3")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].session_id, "s3");
    }

    #[tokio::test]
    async fn delete_all_for_user_removes_only_that_user() {
        let store = store().await;
        for session in ["a", "b", "c"] {
            let mut conversation = conversation_with_turn("u1", session);
            store.save(&mut conversation).await.unwrap();
        }
        let mut keep = conversation_with_turn("u2", "a");
        store.save(&mut keep).await.unwrap();

        assert_eq!(store.delete_all_for_user("u1").await.unwrap(), 3);
        assert!(store.list_by_user("u1", None).await.unwrap().is_empty());
        assert_eq!(store.all_conversations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn all_conversations_attach_their_own_messages() {
        let store = store().await;
        let mut a = conversation_with_turn("u1", "a");
        let mut b = Conversation::new("u2", "b");
        b.append(Message::user("hello"));
        store.save(&mut a).await.unwrap();
        store.save(&mut b).await.unwrap();

        let all = store.all_conversations().await.unwrap();
        let by_session: HashMap<_, _> = all.iter().map(|c| (c.session_id.as_str(), c)).collect();
        assert_eq!(by_session["a"].messages.len(), 2);
        assert_eq!(by_session["b"].messages.len(), 1);
    }

    #[tokio::test]
    async fn ping_reports_availability_and_closed_pool() {
        let store = store().await;
        assert!(store.ping().await);

        store.close().await;
        assert!(!store.ping().await);
        assert!(matches!(
            store.find("u1", "s1").await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn incompatible_schema_version_is_rejected() {
        let store = store().await;
        sqlx::query(SCHEMA_META_TABLE)
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO helpline_schema_meta (key, value) VALUES ($1, '7')")
            .bind(SCHEMA_VERSION_KEY)
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(matches!(
            store.ensure_schema().await,
            Err(StoreError::Corrupt(_))
        ));
        assert!(!store.ping().await);
    }
}
