use super::types::{Completion, CompletionRequest};
use crate::error::ProviderError;
use std::future::Future;
use std::pin::Pin;

pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Completion, ProviderError>> + Send + 'a>>;

/// A hosted text-generation service speaking a chat-completions dialect.
pub trait Provider: Send + Sync {
    /// Provider identifier (e.g. "openai"), used in logs.
    fn name(&self) -> &str;

    /// One attempt, no retry. Errors carry sanitized provider text only.
    fn chat<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a>;
}
