use super::super::{AiConfig, GatewayConfig, ObservabilityConfig, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path the config was loaded from - not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Serialize turns per (user, session) so concurrent messages cannot
    /// overwrite each other (default: true). `false` is last-write-wins.
    #[serde(default = "default_true")]
    pub serialize_turns: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            serialize_turns: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Optional TOML file replacing the built-in knowledge base
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Copy suitable for display: credentials are redacted.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.ai.api_key.is_some() {
            copy.ai.api_key = Some("[REDACTED]".into());
        }
        copy
    }
}
