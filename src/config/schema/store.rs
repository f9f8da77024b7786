use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Durable store connection string (SQLite URL)
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Upper bound for the per-operation connectivity ping
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
}

fn default_database_url() -> String {
    "sqlite://helpline.db?mode=rwc".into()
}

fn default_ping_timeout_ms() -> u64 {
    500
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            ping_timeout_ms: default_ping_timeout_ms(),
        }
    }
}
