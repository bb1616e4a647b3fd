use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Pool node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Chain WebSocket endpoint
    pub chain_endpoint: String,

    /// Path to a file holding the sr25519 secret URI used to sign intents
    pub keypair_path: PathBuf,

    /// Polling configuration
    #[serde(default)]
    pub poll: PollConfig,

    /// Metrics server configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Registry refresh interval in seconds (default: 30)
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Per-request timeout for chain calls in seconds (default: 10)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus metrics server listen address
    #[serde(default = "default_metrics_address")]
    pub listen_address: String,

    /// Metrics server port (default: 9615)
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_address: default_metrics_address(),
            port: default_metrics_port(),
        }
    }
}

// Default value functions
fn default_poll_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

fn default_metrics_address() -> String {
    "0.0.0.0".to_string()
}

fn default_metrics_port() -> u16 {
    9615
}

impl PoolConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: PoolConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        use crate::error::PoolError;

        if !self.chain_endpoint.starts_with("ws://") && !self.chain_endpoint.starts_with("wss://") {
            return Err(PoolError::Config(format!(
                "Chain endpoint must be a ws:// or wss:// URL, got {}",
                self.chain_endpoint
            )));
        }

        if self.poll.interval_secs == 0 {
            return Err(PoolError::Config(
                "Poll interval must be > 0 seconds".to_string(),
            ));
        }

        if self.poll.request_timeout_secs == 0 {
            return Err(PoolError::Config(
                "Request timeout must be > 0 seconds".to_string(),
            ));
        }

        if !self.keypair_path.exists() {
            return Err(PoolError::Config(format!(
                "Keypair file not found at {:?}",
                self.keypair_path
            )));
        }

        Ok(())
    }
}
