use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for Helpline.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; bootstrap code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum HelplineError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Conversation store ──────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Message routing ─────────────────────────────────────────────────
    #[error("router: {0}")]
    Router(#[from] RouterError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("validation failed: {0}")]
    Validation(String),
}

// ─── Store errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("durable store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("stored conversation is corrupt: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Self::Unavailable(error.to_string())
            }
            _ => Self::Query(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Corrupt(error.to_string())
    }
}

// ─── Router errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Message is required")]
    EmptyMessage,

    #[error("{0} not found")]
    NotFound(String),

    #[error("persistence failed: {0}")]
    PersistenceFailed(#[from] StoreError),
}

// ─── Provider errors ─────────────────────────────────────────────────────────

/// Raw failure from a chat-completions provider. Messages are already
/// scrubbed of secrets; only the AI fallback client inspects the fields.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} API key not set")]
    MissingCredential(&'static str),

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("{provider} request failed: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },

    #[error("no response content from {0}")]
    EmptyResponse(&'static str),
}

// ─── AI fallback errors ──────────────────────────────────────────────────────

/// Closed set of AI fallback failures, classified once at the client boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackError {
    #[error("AI fallback is not configured")]
    NotConfigured,

    #[error("provider quota exceeded")]
    QuotaExceeded,

    #[error("provider rejected the credential")]
    InvalidCredential,

    #[error("provider failure: {0}")]
    Unknown(String),
}

pub const NOT_CONFIGURED_REPLY: &str = "I'd love to help you with that! 🤔 For detailed assistance, please contact our support team at support@example.com or try asking about our pricing, refunds, features, or support hours.";
const QUOTA_EXCEEDED_REPLY: &str = "I apologize, but I'm experiencing high demand right now. Please try again in a moment or contact our human support team for immediate assistance.";
const INVALID_CREDENTIAL_REPLY: &str = "I'm having trouble connecting to my brain right now. 🤔 Please try again or reach out to our support team directly.";
const UNKNOWN_FAILURE_REPLY: &str = "I apologize, but I'm having some technical difficulties. Our human support team is available to help you. Please try again in a moment or contact support@example.com.";

impl FallbackError {
    /// Pre-written, user-facing text for this failure. Never contains provider output.
    pub fn reply(&self) -> &'static str {
        match self {
            Self::NotConfigured => NOT_CONFIGURED_REPLY,
            Self::QuotaExceeded => QUOTA_EXCEEDED_REPLY,
            Self::InvalidCredential => INVALID_CREDENTIAL_REPLY,
            Self::Unknown(_) => UNKNOWN_FAILURE_REPLY,
        }
    }

    /// Stable tag used in logs and analytics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::QuotaExceeded => "quota_exceeded",
            Self::InvalidCredential => "invalid_credential",
            Self::Unknown(_) => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_into_router_persistence_failure() {
        let err: RouterError = StoreError::Query("disk full".into()).into();
        assert!(matches!(err, RouterError::PersistenceFailed(_)));
        assert_eq!(err.to_string(), "persistence failed: query failed: disk full");
    }

    #[test]
    fn pool_closed_maps_to_unavailable() {
        let err: StoreError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn fallback_replies_are_distinct_and_never_empty() {
        let all = [
            FallbackError::NotConfigured,
            FallbackError::QuotaExceeded,
            FallbackError::InvalidCredential,
            FallbackError::Unknown("boom".into()),
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(!a.reply().is_empty());
            for b in &all[i + 1..] {
                assert_ne!(a.reply(), b.reply());
            }
        }
    }

    #[test]
    fn unknown_reply_does_not_leak_provider_text() {
        let err = FallbackError::Unknown("sk-secret upstream body".into());
        assert!(!err.reply().contains("sk-secret"));
        assert_eq!(err.kind(), "unknown");
    }

    #[test]
    fn provider_api_error_display_includes_status() {
        let err = ProviderError::Api {
            provider: "OpenAI",
            status: 429,
            code: Some("insufficient_quota".into()),
            message: "You exceeded your current quota".into(),
        };
        assert_eq!(
            err.to_string(),
            "OpenAI API error (429): You exceeded your current quota"
        );
    }

    #[test]
    fn top_level_wraps_subsystem_errors() {
        let err: HelplineError = RouterError::EmptyMessage.into();
        assert_eq!(err.to_string(), "router: Message is required");
    }
}
