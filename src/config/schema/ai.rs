use serde::{Deserialize, Serialize};

/// Value shipped in sample env files; treated the same as no key at all.
pub const PLACEHOLDER_API_KEY: &str = "your_openai_api_key_here";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Provider credential. Absent, empty or placeholder disables AI fallback.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI-compatible API root, without the `/chat/completions` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Provider request timeout. Must stay below the gateway request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4".into()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AiConfig {
    /// The usable credential, if any.
    pub fn effective_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_and_blank_keys_are_not_usable() {
        let mut config = AiConfig::default();
        assert!(config.effective_api_key().is_none());

        config.api_key = Some("   ".into());
        assert!(config.effective_api_key().is_none());

        config.api_key = Some(PLACEHOLDER_API_KEY.into());
        assert!(config.effective_api_key().is_none());

        config.api_key = Some(" sk-real ".into());
        assert_eq!(config.effective_api_key(), Some("sk-real"));
    }
}
