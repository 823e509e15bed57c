//! Server configuration.
//!
//! Layered: built-in defaults, then an optional config file, then
//! environment variables prefixed `DEVMESH_MCP__` (double underscore
//! separates nested keys, matching the `config` crate's own convention).
//! An invalid configuration fails at startup, never mid-request.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum inbound frame size (1 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub max_frame_bytes: usize,
    pub inbound_queue_depth: usize,
    pub outbound_queue_depth: usize,
    pub ping_interval_secs: u64,
    pub pong_timeout_secs: u64,
    pub default_call_deadline_secs: u64,
    pub max_call_deadline_secs: u64,
    pub drain_deadline_secs: u64,
    pub protocol_versions_supported: Vec<String>,
    pub origin_allowlist: Vec<String>,
    pub strict_params: bool,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9443".to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            inbound_queue_depth: 64,
            outbound_queue_depth: 256,
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
            default_call_deadline_secs: 30,
            max_call_deadline_secs: 300,
            drain_deadline_secs: 30,
            protocol_versions_supported: devmesh_mcp_protocol::SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            origin_allowlist: Vec::new(),
            strict_params: false,
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    pub fn default_call_deadline(&self) -> Duration {
        Duration::from_secs(self.default_call_deadline_secs)
    }

    pub fn max_call_deadline(&self) -> Duration {
        Duration::from_secs(self.max_call_deadline_secs)
    }

    /// How long a `Draining` session is given to reach zero outstanding
    /// requests before it is closed regardless.
    pub fn drain_deadline(&self) -> Duration {
        Duration::from_secs(self.drain_deadline_secs)
    }

    /// Load defaults, then `config/<file>` if present, then
    /// `DEVMESH_MCP__*` environment overrides.
    pub fn load(file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DEVMESH_MCP")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

/// Default of 100 requests per 60s, burst 10; all three values are
/// configurable per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_period: u32,
    pub period_seconds: u64,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_period: 100,
            period_seconds: 60,
            burst_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.max_frame_bytes, 1024 * 1024);
        assert_eq!(cfg.rate_limit.period_seconds, 60);
    }

    #[test]
    fn load_without_file_falls_back_to_defaults() {
        let cfg = ServerConfig::load(None).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9443");
    }

    #[test]
    fn env_override_wins_over_defaults() {
        // SAFETY-equivalent: std::env::set_var is unsafe in 2024-edition std,
        // but this crate targets 2021 where it remains a safe fn.
        std::env::set_var("DEVMESH_MCP__LISTEN_ADDR", "0.0.0.0:9000");
        let cfg = ServerConfig::load(None).unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:9000");
        std::env::remove_var("DEVMESH_MCP__LISTEN_ADDR");
    }
}
