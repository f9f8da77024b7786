use super::scrub::{api_error, sanitize_api_error};
use super::traits::{Provider, ProviderFuture};
use super::types::{ChatRole, Completion, CompletionRequest, TokenUsage};
use crate::error::ProviderError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "OpenAI";

/// Chat-completions client for OpenAI and API-compatible endpoints.
pub struct OpenAiProvider {
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    /// Pre-computed chat completions URL.
    cached_chat_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f64,
    presence_penalty: f64,
    frequency_penalty: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout_secs: u64) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let cached_chat_url = if base_url.ends_with("chat/completions") {
            base_url.to_string()
        } else {
            format!("{base_url}/chat/completions")
        };

        Self {
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            cached_chat_url,
            client: build_client(timeout_secs),
        }
    }

    fn chat_completions_url(&self) -> &str {
        &self.cached_chat_url
    }

    fn build_request(request: &CompletionRequest) -> ChatRequest<'_> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(Message {
            role: ChatRole::System.as_str(),
            content: &request.system_prompt,
        });
        messages.extend(request.messages.iter().map(|m| Message {
            role: m.role.as_str(),
            content: &m.content,
        }));

        ChatRequest {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            presence_penalty: request.presence_penalty,
            frequency_penalty: request.frequency_penalty,
        }
    }

    fn into_completion(chat_response: ChatResponse) -> Result<Completion, ProviderError> {
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse(PROVIDER))?;

        Ok(Completion {
            content,
            usage: chat_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u
                    .total_tokens
                    .unwrap_or(u.prompt_tokens + u.completion_tokens),
            }),
            model: chat_response.model,
        })
    }

    async fn call_api(&self, request: &CompletionRequest) -> Result<ChatResponse, ProviderError> {
        let auth_header = self
            .cached_auth_header
            .as_ref()
            .ok_or(ProviderError::MissingCredential(PROVIDER))?;

        let response = self
            .client
            .post(self.chat_completions_url())
            .header("Authorization", auth_header)
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider: PROVIDER,
                message: sanitize_api_error(&e.to_string()),
            })?;

        if !response.status().is_success() {
            return Err(api_error(PROVIDER, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Transport {
                provider: PROVIDER,
                message: format!("response JSON decode failed: {}", sanitize_api_error(&e.to_string())),
            })
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn chat<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a> {
        Box::pin(async move {
            let chat_response = self.call_api(request).await?;
            Self::into_completion(chat_response)
        })
    }
}
