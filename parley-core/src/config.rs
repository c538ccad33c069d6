// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates the relay endpoint and timing values, defaults everything else
use crate::paths;
use crate::refresh::RefreshPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3001";
pub const DEFAULT_MODEL: &str = "llama3.2";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Message bus endpoint (http, https, ws or wss)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Timeout for the `/health` probe
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            health_timeout_secs: default_health_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub while_disconnected: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            while_disconnected: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Connect automatically as this user on startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            username: None,
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_handshake_timeout_secs() -> u64 {
    10
}

fn default_health_timeout_secs() -> u64 {
    5
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Config {
    fn find_config_file() -> Option<PathBuf> {
        // PARLEY_CONFIG_PATH wins (useful for testing)
        if let Ok(env_path) = std::env::var("PARLEY_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("parley.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration with environment variable overrides.
    /// Searches: PARLEY_CONFIG_PATH, ./parley.toml, then ~/.config/parley/config.toml
    pub fn load() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("BACKEND_URL") {
            self.relay.endpoint = val;
        }
        if let Ok(val) = std::env::var("PARLEY_HANDSHAKE_TIMEOUT_SECS") {
            self.relay.handshake_timeout_secs = val
                .parse()
                .with_context(|| format!("Invalid PARLEY_HANDSHAKE_TIMEOUT_SECS: {}", val))?;
        }
        if let Ok(val) = std::env::var("PARLEY_HEALTH_TIMEOUT_SECS") {
            self.relay.health_timeout_secs = val
                .parse()
                .with_context(|| format!("Invalid PARLEY_HEALTH_TIMEOUT_SECS: {}", val))?;
        }
        if let Ok(val) = std::env::var("PARLEY_REFRESH_INTERVAL_MS") {
            self.refresh.interval_ms = val
                .parse()
                .with_context(|| format!("Invalid PARLEY_REFRESH_INTERVAL_MS: {}", val))?;
        }
        if let Ok(val) = std::env::var("PARLEY_REFRESH_WHILE_DISCONNECTED") {
            self.refresh.while_disconnected = val
                .parse()
                .with_context(|| format!("Invalid PARLEY_REFRESH_WHILE_DISCONNECTED: {}", val))?;
        }
        if let Ok(val) = std::env::var("PARLEY_DEFAULT_MODEL") {
            self.chat.default_model = val;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let endpoint = url::Url::parse(&self.relay.endpoint)
            .with_context(|| format!("Invalid relay.endpoint '{}'", self.relay.endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https" | "ws" | "wss") {
            anyhow::bail!(
                "relay.endpoint must use http, https, ws or wss (got '{}')",
                endpoint.scheme()
            );
        }
        if endpoint.host_str().is_none() {
            anyhow::bail!("relay.endpoint '{}' has no host", self.relay.endpoint);
        }
        if self.relay.handshake_timeout_secs == 0 {
            anyhow::bail!("relay.handshake_timeout_secs must be greater than zero");
        }
        if self.relay.health_timeout_secs == 0 {
            anyhow::bail!("relay.health_timeout_secs must be greater than zero");
        }
        if self.refresh.interval_ms == 0 {
            anyhow::bail!("refresh.interval_ms must be greater than zero");
        }
        if self.chat.default_model.trim().is_empty() {
            anyhow::bail!("chat.default_model must not be empty");
        }
        Ok(())
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            interval: Duration::from_millis(self.refresh.interval_ms),
            while_disconnected: self.refresh.while_disconnected,
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.relay.handshake_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.relay.health_timeout_secs)
    }
}
