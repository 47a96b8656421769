//! Configuration for ruian-sync

mod import;
mod logging;
mod store;

pub use import::{ImportConfig, ImportStrategy, DEFAULT_BASE_URL};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use store::StoreConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for the archive download
pub const DEFAULT_USER_AGENT: &str = "ruian-sync/0.1 (+https://github.com/ruian-sync)";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Import pipeline configuration
    #[serde(default)]
    pub import: ImportConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.store.data_dir.as_os_str().is_empty() {
            errors.push("data_dir must not be empty".to_string());
        }

        match url::Url::parse(&self.import.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )),
            Err(e) => errors.push(format!("base_url is not a valid URL: {}", e)),
        }
        if self.import.archive_suffix.is_empty() {
            errors.push("archive_suffix must not be empty".to_string());
        }
        if self.import.member_extension.is_empty() {
            errors.push("member_extension must not be empty".to_string());
        }
        if self.import.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be positive".to_string());
        }
        if self.import.checkpoint_rows == 0 {
            errors.push("checkpoint_rows must be positive".to_string());
        }
        if self.import.progress_log_rows == 0 {
            errors.push("progress_log_rows must be positive".to_string());
        }
        if self.import.months_back > 24 {
            errors.push("months_back must be <= 24".to_string());
        }
        if self.import.max_error_length < 16 {
            errors.push("max_error_length must be at least 16".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
