//! Turn-level wrapper around a [`Provider`].
//!
//! Owns the single "is AI configured" capability check and turns every
//! provider failure into a closed [`FallbackError`], so nothing past this
//! boundary inspects provider-specific codes.

use super::openai::OpenAiProvider;
use super::traits::Provider;
use super::types::{ChatMessage, Completion, CompletionRequest};
use crate::config::AiConfig;
use crate::error::{FallbackError, ProviderError};
use std::sync::Arc;

/// Number of most recent conversation messages sent to the provider.
pub const CONTEXT_WINDOW: usize = 6;

const PRESENCE_PENALTY: f64 = 0.1;
const FREQUENCY_PENALTY: f64 = 0.1;

pub const SYSTEM_PROMPT: &str = "You are a helpful, friendly customer support assistant for a SaaS company. Your role is to:

1. Answer customer questions clearly and concisely
2. Be empathetic and professional
3. Provide accurate information about products and services
4. Escalate complex issues to human support when needed
5. Use emojis appropriately to be friendly
6. Keep responses focused and not too long

Important guidelines:
- If you don't know something, admit it and offer to connect with human support
- Always be polite and patient
- Provide step-by-step instructions when explaining processes
- Format responses with bullet points or numbered lists when appropriate";

#[derive(Clone)]
pub struct AiFallbackClient {
    provider: Option<Arc<dyn Provider>>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl AiFallbackClient {
    /// OpenAI-compatible client when a usable key is configured, otherwise
    /// an unconfigured client that never touches the network.
    pub fn from_config(config: &AiConfig) -> Self {
        let provider = config.effective_api_key().map(|key| {
            Arc::new(OpenAiProvider::new(
                &config.base_url,
                Some(key),
                config.timeout_secs,
            )) as Arc<dyn Provider>
        });

        if provider.is_some() {
            tracing::info!(model = %config.model, "AI fallback configured");
        } else {
            tracing::warn!("AI API key not configured - AI fallback disabled");
        }

        Self::from_parts(provider, config)
    }

    pub fn with_provider(provider: Arc<dyn Provider>, config: &AiConfig) -> Self {
        Self::from_parts(Some(provider), config)
    }

    pub fn unconfigured() -> Self {
        Self::from_parts(None, &AiConfig::default())
    }

    fn from_parts(provider: Option<Arc<dyn Provider>>, config: &AiConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Ask the provider for a reply to the tail of `history`.
    ///
    /// Only the last [`CONTEXT_WINDOW`] messages are sent. Without a provider
    /// this returns `NotConfigured` immediately.
    pub async fn complete(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
    ) -> Result<Completion, FallbackError> {
        let Some(provider) = self.provider.as_ref() else {
            return Err(FallbackError::NotConfigured);
        };

        let window_start = history.len().saturating_sub(CONTEXT_WINDOW);
        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt: system_prompt.to_string(),
            messages: history[window_start..].to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            presence_penalty: PRESENCE_PENALTY,
            frequency_penalty: FREQUENCY_PENALTY,
        };

        match provider.chat(&request).await {
            Ok(completion) => {
                tracing::debug!(
                    provider = provider.name(),
                    usage = ?completion.usage,
                    "AI fallback completed"
                );
                Ok(completion)
            }
            Err(error) => {
                let classified = classify(&error);
                tracing::warn!(
                    provider = provider.name(),
                    kind = classified.kind(),
                    error = %error,
                    "AI fallback failed"
                );
                Err(classified)
            }
        }
    }
}

impl std::fmt::Debug for AiFallbackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiFallbackClient")
            .field("configured", &self.is_configured())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

fn classify(error: &ProviderError) -> FallbackError {
    match error {
        ProviderError::MissingCredential(_) => FallbackError::NotConfigured,
        ProviderError::Api { code, status, .. } => match code.as_deref() {
            Some("insufficient_quota") => FallbackError::QuotaExceeded,
            Some("invalid_api_key") => FallbackError::InvalidCredential,
            _ if *status == 401 => FallbackError::InvalidCredential,
            _ => FallbackError::Unknown(error.to_string()),
        },
        ProviderError::Transport { .. } | ProviderError::EmptyResponse(_) => {
            FallbackError::Unknown(error.to_string())
        }
    }
}
