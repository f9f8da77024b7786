use super::Config;
use crate::error::ConfigError;
use crate::gateway::REQUEST_TIMEOUT_SECS;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    /// Load `path` when given, otherwise `~/.helpline/config.toml` (created with
    /// defaults on first run). Environment overrides are applied last and are
    /// never written back.
    pub fn load_or_init(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(explicit) => Self::load_from(explicit)?,
            None => {
                let default_path = Self::default_path()?;
                if default_path.exists() {
                    Self::load_from(&default_path)?
                } else {
                    let config = Self {
                        config_path: default_path,
                        ..Self::default()
                    };
                    config.save()?;
                    config
                }
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    fn default_path() -> Result<PathBuf> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Ok(home.join(".helpline").join("config.toml"))
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(ConfigError::Validation(format!(
                "ai.temperature must be within 0.0..=2.0 (got {})",
                self.ai.temperature
            )));
        }
        if self.ai.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "ai.max_tokens must be positive".into(),
            ));
        }
        if self.ai.timeout_secs == 0 || self.ai.timeout_secs >= REQUEST_TIMEOUT_SECS {
            return Err(ConfigError::Validation(format!(
                "ai.timeout_secs must be within 1..{REQUEST_TIMEOUT_SECS} (got {})",
                self.ai.timeout_secs
            )));
        }
        if self.store.database_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "store.database_url must not be empty".into(),
            ));
        }
        Ok(())
    }
}
