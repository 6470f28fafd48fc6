// SPDX-License-Identifier: MIT OR Apache-2.0
//! Server configuration types.

use std::net::SocketAddr;
use std::time::Duration;

use crate::ai::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::error::{Result, ServerError};
use crate::feed::DEFAULT_FEED_CAPACITY;

// Environment variable names for configuration.

/// Bind address environment variable.
pub const ENV_BIND_ADDR: &str = "KUDOS_BIND_ADDR";
/// Hosted store base URL environment variable.
pub const ENV_STORE_URL: &str = "KUDOS_STORE_URL";
/// Hosted store service key environment variable.
pub const ENV_STORE_KEY: &str = "KUDOS_STORE_KEY";
/// AI gateway API key environment variable.
pub const ENV_AI_API_KEY: &str = "KUDOS_AI_API_KEY";
/// AI gateway base URL environment variable.
pub const ENV_AI_BASE_URL: &str = "KUDOS_AI_BASE_URL";
/// AI model environment variable.
pub const ENV_AI_MODEL: &str = "KUDOS_AI_MODEL";
/// AI sampling temperature environment variable.
pub const ENV_AI_TEMPERATURE: &str = "KUDOS_AI_TEMPERATURE";
/// Outbound request timeout seconds environment variable.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "KUDOS_REQUEST_TIMEOUT_SECS";
/// Leaderboard size environment variable.
pub const ENV_LEADERBOARD_LIMIT: &str = "KUDOS_LEADERBOARD_LIMIT";
/// Leaderboard poll interval seconds environment variable.
pub const ENV_LEADERBOARD_POLL_SECS: &str = "KUDOS_LEADERBOARD_POLL_SECS";
/// Maximum request body size environment variable.
pub const ENV_MAX_BODY_SIZE: &str = "KUDOS_MAX_BODY_SIZE";
/// Enable CORS environment variable.
pub const ENV_ENABLE_CORS: &str = "KUDOS_ENABLE_CORS";
/// Change feed buffer environment variable.
pub const ENV_FEED_CAPACITY: &str = "KUDOS_FEED_CAPACITY";

/// Environment variable parsing helpers.
mod env_parse {
    use std::net::SocketAddr;
    use std::time::Duration;

    use super::{Result, ServerError};

    /// Parse a socket address from an environment variable.
    pub fn parse_socket_addr(key: &str) -> Option<Result<SocketAddr>> {
        std::env::var(key).ok().map(|val| {
            val.parse()
                .map_err(|e| ServerError::Config(format!("invalid {key}: {e}")))
        })
    }

    /// Parse a usize from an environment variable.
    pub fn parse_usize(key: &str) -> Option<Result<usize>> {
        std::env::var(key).ok().map(|val| {
            val.parse()
                .map_err(|e| ServerError::Config(format!("invalid {key}: {e}")))
        })
    }

    /// Parse an f32 from an environment variable.
    pub fn parse_f32(key: &str) -> Option<Result<f32>> {
        std::env::var(key).ok().map(|val| {
            val.parse()
                .map_err(|e| ServerError::Config(format!("invalid {key}: {e}")))
        })
    }

    /// Parse a boolean from an environment variable.
    /// Accepts "true", "1", "yes", "on" as true (case-insensitive).
    /// Accepts "false", "0", "no", "off" as false (case-insensitive).
    pub fn parse_bool(key: &str) -> Option<Result<bool>> {
        std::env::var(key)
            .ok()
            .map(|val| match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ServerError::Config(format!(
                    "invalid {key}: expected boolean (true/false/1/0/yes/no/on/off)"
                ))),
            })
    }

    /// Parse a duration in seconds from an environment variable.
    pub fn parse_duration_secs(key: &str) -> Option<Result<Duration>> {
        std::env::var(key).ok().map(|val| {
            val.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ServerError::Config(format!("invalid {key}: {e}")))
        })
    }

    /// Read a non-empty string from an environment variable.
    pub fn parse_string(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Hosted store connection settings.
#[derive(Clone)]
pub struct StoreConfig {
    /// Base URL of the hosted project.
    pub url: String,
    /// Service key sent as `apikey` and bearer token.
    pub key: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
    /// Hosted store (optional, None uses the in-memory store).
    pub store: Option<StoreConfig>,
    /// AI gateway API key. Extraction fails with a configuration error
    /// while unset.
    pub ai_api_key: Option<String>,
    /// AI gateway base URL.
    pub ai_base_url: String,
    /// AI model.
    pub ai_model: String,
    /// AI sampling temperature.
    pub ai_temperature: f32,
    /// Timeout for outbound requests.
    pub request_timeout: Duration,
    /// Number of leaderboard entries.
    pub leaderboard_limit: usize,
    /// Leaderboard poll interval.
    pub leaderboard_poll_interval: Duration,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Answer CORS preflights and add CORS headers.
    pub enable_cors: bool,
    /// Change feed buffer per subscriber.
    pub feed_capacity: usize,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("store", &self.store)
            .field("ai_api_key", &self.ai_api_key.as_ref().map(|_| "<redacted>"))
            .field("ai_base_url", &self.ai_base_url)
            .field("ai_model", &self.ai_model)
            .field("ai_temperature", &self.ai_temperature)
            .field("request_timeout", &self.request_timeout)
            .field("leaderboard_limit", &self.leaderboard_limit)
            .field("leaderboard_poll_interval", &self.leaderboard_poll_interval)
            .field("max_body_size", &self.max_body_size)
            .field("enable_cors", &self.enable_cors)
            .field("feed_capacity", &self.feed_capacity)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            store: None,
            ai_api_key: None,
            ai_base_url: DEFAULT_BASE_URL.to_string(),
            ai_model: DEFAULT_MODEL.to_string(),
            ai_temperature: DEFAULT_TEMPERATURE,
            request_timeout: Duration::from_secs(30),
            leaderboard_limit: kudos_engine::leaderboard::DEFAULT_LIMIT,
            leaderboard_poll_interval: Duration::from_secs(30),
            max_body_size: 1024 * 1024, // 1MB
            enable_cors: true,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `KUDOS_*` environment variables on top of
    /// the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(result) = env_parse::parse_socket_addr(ENV_BIND_ADDR) {
            config.bind_addr = result?;
        }

        // Hosted store (requires both URL and key)
        let url = env_parse::parse_string(ENV_STORE_URL);
        let key = env_parse::parse_string(ENV_STORE_KEY);
        match (url, key) {
            (Some(url), Some(key)) => config.store = Some(StoreConfig { url, key }),
            (None, None) => {},
            _ => {
                return Err(ServerError::Config(format!(
                    "{ENV_STORE_URL} and {ENV_STORE_KEY} must be set together"
                )))
            },
        }

        // AI gateway
        config.ai_api_key = env_parse::parse_string(ENV_AI_API_KEY);
        if let Some(url) = env_parse::parse_string(ENV_AI_BASE_URL) {
            config.ai_base_url = url;
        }
        if let Some(model) = env_parse::parse_string(ENV_AI_MODEL) {
            config.ai_model = model;
        }
        if let Some(result) = env_parse::parse_f32(ENV_AI_TEMPERATURE) {
            config.ai_temperature = result?;
        }

        if let Some(result) = env_parse::parse_duration_secs(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout = result?;
        }
        if let Some(result) = env_parse::parse_usize(ENV_LEADERBOARD_LIMIT) {
            config.leaderboard_limit = result?;
        }
        if let Some(result) = env_parse::parse_duration_secs(ENV_LEADERBOARD_POLL_SECS) {
            config.leaderboard_poll_interval = result?;
        }
        if let Some(result) = env_parse::parse_usize(ENV_MAX_BODY_SIZE) {
            config.max_body_size = result?;
        }
        if let Some(result) = env_parse::parse_bool(ENV_ENABLE_CORS) {
            config.enable_cors = result?;
        }
        if let Some(result) = env_parse::parse_usize(ENV_FEED_CAPACITY) {
            config.feed_capacity = result?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the bind address.
    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Use the hosted store.
    #[must_use]
    pub fn with_store(mut self, url: impl Into<String>, key: impl Into<String>) -> Self {
        self.store = Some(StoreConfig {
            url: url.into(),
            key: key.into(),
        });
        self
    }

    /// Set the AI gateway API key.
    #[must_use]
    pub fn with_ai_api_key(mut self, key: impl Into<String>) -> Self {
        self.ai_api_key = Some(key.into());
        self
    }

    /// Set the AI gateway base URL.
    #[must_use]
    pub fn with_ai_base_url(mut self, url: impl Into<String>) -> Self {
        self.ai_base_url = url.into();
        self
    }

    /// Set the AI model.
    #[must_use]
    pub fn with_ai_model(mut self, model: impl Into<String>) -> Self {
        self.ai_model = model.into();
        self
    }

    /// Set the outbound request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the number of leaderboard entries.
    #[must_use]
    pub const fn with_leaderboard_limit(mut self, limit: usize) -> Self {
        self.leaderboard_limit = limit;
        self
    }

    /// Set the leaderboard poll interval.
    #[must_use]
    pub const fn with_leaderboard_poll_interval(mut self, interval: Duration) -> Self {
        self.leaderboard_poll_interval = interval;
        self
    }

    /// Set the maximum request body size.
    #[must_use]
    pub const fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Enable or disable CORS.
    #[must_use]
    pub const fn with_cors(mut self, enabled: bool) -> Self {
        self.enable_cors = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.leaderboard_limit == 0 {
            return Err(ServerError::Config(
                "leaderboard_limit must be greater than 0".to_string(),
            ));
        }

        if self.leaderboard_poll_interval.is_zero() {
            return Err(ServerError::Config(
                "leaderboard_poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ServerError::Config(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_body_size == 0 {
            return Err(ServerError::Config(
                "max_body_size must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.ai_temperature) {
            return Err(ServerError::Config(
                "ai_temperature must be between 0 and 2".to_string(),
            ));
        }

        if let Some(ref store) = self.store {
            if !store.url.starts_with("http://") && !store.url.starts_with("https://") {
                return Err(ServerError::Config(format!(
                    "store url must be http(s): {}",
                    store.url
                )));
            }
        }

        Ok(())
    }
}
