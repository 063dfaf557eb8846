//! Node configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional config
//! file (YAML, TOML or JSON), `MURMUR_*` environment variables, `PORT`, then
//! command-line flags applied by the binary.

use config::{Config, Environment, File};
use murmur_realtime::RelayConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "MURMUR";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be read or parsed.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A user seeded at startup with a static bearer token.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SeedUser {
    /// Identity id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Avatar URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Static bearer token.
    pub token: String,
}

/// Configuration for the Murmur node.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP/WebSocket listen address.
    pub api_addr: SocketAddr,
    /// Liveness probe period in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// History clear period in milliseconds.
    pub history_clear_interval_ms: u64,
    /// Maximum messages replayed to a newcomer.
    pub history_replay_cap: Option<usize>,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Reject sessions and submits without a valid token.
    pub require_auth: bool,
    /// Log level.
    pub log_level: String,
    /// Log format (pretty or json).
    pub log_format: String,
    /// Identities registered at startup.
    pub users: Vec<SeedUser>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            heartbeat_interval_ms: 30_000,
            history_clear_interval_ms: 1_800_000,
            history_replay_cap: None,
            max_connections: 10_000,
            require_auth: false,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            users: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from an optional file and the environment.
    ///
    /// The result is not validated, so command-line overrides can still be
    /// applied. Call [`NodeConfig::validate`] once they are.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let mut config: NodeConfig = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            config.api_addr.set_port(port);
        }

        Ok(config)
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval_ms must be positive".into(),
            ));
        }
        if self.history_clear_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "history_clear_interval_ms must be positive".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be positive".into()));
        }
        if self.require_auth && self.users.is_empty() {
            tracing::warn!("require_auth is set but no users are configured");
        }
        Ok(())
    }

    /// Settings for the relay core.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            history_clear_interval: Duration::from_millis(self.history_clear_interval_ms),
            history_replay_cap: self.history_replay_cap,
            max_connections: self.max_connections,
        }
    }
}
