//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::time::Duration;
use tracing::Level;
use url::Url;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Identity details for the environment-backed identity provider.
#[derive(Clone, Debug, Default)]
pub struct IdentityConfig {
    pub id_token: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub backend_url: Url,
    pub log_level: Level,
    /// `None` disables the timeout.
    pub request_timeout: Option<Duration>,
    pub identity: IdentityConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Backend ---
        let backend_url_str = lookup("DOC_CHAT_BACKEND_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        let backend_url = parse_backend_url(&backend_url_str)?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let timeout_str =
            lookup("DOC_CHAT_REQUEST_TIMEOUT_SECS").unwrap_or_else(|| "120".to_string());
        let timeout_secs = timeout_str.trim().parse::<u64>().map_err(|e| {
            ConfigError::InvalidValue("DOC_CHAT_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;
        let request_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        // --- Identity (all optional) ---
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let identity = IdentityConfig {
            id_token: non_empty("DOC_CHAT_ID_TOKEN"),
            user_id: non_empty("DOC_CHAT_USER_ID"),
            email: non_empty("DOC_CHAT_USER_EMAIL"),
            display_name: non_empty("DOC_CHAT_USER_NAME"),
            avatar_url: non_empty("DOC_CHAT_AVATAR_URL"),
        };

        Ok(Self {
            backend_url,
            log_level,
            request_timeout,
            identity,
        })
    }
}

fn parse_backend_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue("DOC_CHAT_BACKEND_URL".into(), reason);
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
