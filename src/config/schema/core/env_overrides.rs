use super::Config;
use crate::config::LogLevel;
use std::str::FromStr;

fn env_value(primary: &str, fallback: Option<&str>) -> Option<String> {
    std::env::var(primary)
        .ok()
        .or_else(|| fallback.and_then(|name| std::env::var(name).ok()))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Some(port_str) = env_value("HELPLINE_PORT", Some("PORT"))
            && let Ok(port) = port_str.parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Some(host) = env_value("HELPLINE_HOST", Some("HOST")) {
            self.gateway.host = host;
        }

        if let Some(origin) = env_value("HELPLINE_FRONTEND_URL", Some("FRONTEND_URL")) {
            self.gateway.allowed_origins = origin
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }

        if let Some(url) = env_value("HELPLINE_DATABASE_URL", Some("DATABASE_URL")) {
            self.store.database_url = url;
        }

        if let Some(key) = env_value("HELPLINE_API_KEY", Some("OPENAI_API_KEY")) {
            self.ai.api_key = Some(key);
        }

        if let Some(model) = env_value("HELPLINE_MODEL", None) {
            self.ai.model = model;
        }

        if let Some(level) = env_value("HELPLINE_LOG_LEVEL", None)
            && let Ok(level) = LogLevel::from_str(&level)
        {
            self.observability.log_level = level;
        }
    }
}
