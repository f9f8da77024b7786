// ── Infrastructure ───────────────────────────────────────────────────────────
pub mod scrub;
pub mod traits;
pub mod types;

// ── Provider implementations ────────────────────────────────────────────────
pub mod openai;

// ── Turn-level client ───────────────────────────────────────────────────────
pub mod fallback;

pub use fallback::{AiFallbackClient, CONTEXT_WINDOW, SYSTEM_PROMPT};
pub use openai::OpenAiProvider;
pub use scrub::{api_error, sanitize_api_error, scrub_secret_patterns};
pub use traits::{Provider, ProviderFuture};
pub use types::{ChatMessage, ChatRole, Completion, CompletionRequest, TokenUsage};
