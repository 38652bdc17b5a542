//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Primary listen port.
pub const PRIMARY_PORT: u16 = 12333;

/// Fallback listen port, tried when the primary is taken.
pub const SECONDARY_PORT: u16 = 12334;

/// Root configuration for the proxy daemon.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host, candidate ports, timeouts).
    pub listener: ListenerConfig,

    /// Remote database API settings.
    pub backend: BackendConfig,

    /// Header-addressed compatibility route settings.
    pub compat: CompatConfig,

    /// Optional and tunable routes.
    pub routes: RoutesConfig,

    /// Payload size thresholds.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Host label reported in the `Run.Host` field of every envelope.
    pub host_name: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            backend: BackendConfig::default(),
            compat: CompatConfig::default(),
            routes: RoutesConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
            host_name: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Candidate ports, tried in order. The first free one wins.
    pub ports: Vec<u16>,

    /// Per-request timeout in seconds. Generous so slow backends can finish.
    pub request_timeout_secs: u64,

    /// How long `close` waits for open connections to finish, in milliseconds.
    pub drain_timeout_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            ports: vec![PRIMARY_PORT, SECONDARY_PORT],
            request_timeout_secs: 20,
            drain_timeout_ms: 1000,
        }
    }
}

/// Remote database API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL requests are POSTed to.
    pub endpoint: String,

    /// Timeout for a single backend call in seconds.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Compatibility route configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompatConfig {
    /// Request header naming the target operation.
    pub target_header: String,

    /// The single API version accepted as a prefix of the target header.
    pub api_version: String,
}

impl Default for CompatConfig {
    fn default() -> Self {
        Self {
            target_header: "X-Amz-Target".to_string(),
            api_version: "DynamoDB_20120810".to_string(),
        }
    }
}

/// Route registration options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Register `/DeleteTable` and `/DeleteTable/<name>`. Off by default.
    pub enable_delete_table: bool,

    /// Attempts made by `/StatusTable/<name>?poll=1`. Polling also stops
    /// early, with `StatusResult: false`, once another interval would run
    /// within a second of `listener.request_timeout_secs`. The defaults
    /// (50 x 300 ms) fit under the default 20 s timeout.
    pub status_poll_attempts: u32,

    /// Delay between status poll attempts in milliseconds.
    pub status_poll_interval_ms: u64,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            enable_delete_table: false,
            status_poll_attempts: 50,
            status_poll_interval_ms: 300,
        }
    }
}

/// Payload size thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Request bodies above this size are logged as a warning, never rejected.
    pub large_payload_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            large_payload_bytes: 1024 * 1024, // 1MiB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9333".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_try_primary_then_secondary() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.ports, vec![PRIMARY_PORT, SECONDARY_PORT]);
        assert_eq!(config.listener.drain_timeout_ms, 1000);
        assert!(!config.routes.enable_delete_table);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            ports = [9000]

            [compat]
            api_version = "2012-08-10"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.ports, vec![9000]);
        assert_eq!(config.listener.request_timeout_secs, 20);
        assert_eq!(config.compat.api_version, "2012-08-10");
        assert_eq!(config.compat.target_header, "X-Amz-Target");
    }
}
