//! Configuration schema definitions.
//!
//! Two documents are involved:
//! - [`StaticConfig`]: loaded once at startup (entry points, defaults,
//!   observability, admin).
//! - [`DynamicConfig`]: routers, reloaded whenever the watched file
//!   changes.
//!
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entrypoint::EntryPointTransport;

/// Root static configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StaticConfig {
    /// Entry points that exist for the whole process lifetime.
    pub entry_points: BTreeMap<String, EntryPointConfig>,

    /// Default transport settings for every entry point.
    pub transport: EntryPointTransport,

    /// Listener lifecycle settings.
    pub lifecycle: LifecycleConfig,

    /// Where dynamic configuration comes from.
    pub providers: ProvidersConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// A statically declared entry point.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntryPointConfig {
    /// Address in `[host]:port[/tcp|/udp]` form.
    pub address: String,

    /// Serve HTTP on this TCP entry point (ignored for UDP).
    #[serde(default = "default_http")]
    pub http: bool,

    /// Per-entry-point timeouts used instead of `[transport]`.
    #[serde(default)]
    pub transport: Option<EntryPointTransport>,
}

fn default_http() -> bool {
    true
}

/// Listener lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Upper bound on how long a stopping listener waits for in-flight work.
    #[serde(with = "crate::config::duration")]
    pub drain_delay: Duration,

    /// Receive buffer size for UDP listeners, in bytes.
    pub udp_buffer_size: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_delay: Duration::from_secs(10),
            udp_buffer_size: 64 * 1024,
        }
    }
}

/// Dynamic configuration providers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Path of the dynamic configuration file (TOML or JSON).
    pub file: Option<PathBuf>,

    /// Reload the file when it changes.
    pub watch: bool,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self { file: None, watch: true }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Root dynamic configuration: routers per protocol family.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DynamicConfig {
    pub http: HttpConfiguration,
    pub tcp: TcpConfiguration,
    pub udp: UdpConfiguration,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HttpConfiguration {
    pub routers: BTreeMap<String, HttpRouter>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TcpConfiguration {
    pub routers: BTreeMap<String, TcpRouter>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct UdpConfiguration {
    pub routers: BTreeMap<String, UdpRouter>,
}

/// HTTP router as far as entry point reconciliation is concerned.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HttpRouter {
    #[serde(alias = "entryPoints")]
    pub entry_points: Vec<String>,

    pub rule: String,

    pub service: String,

    pub priority: i64,

    /// Opaque JSON transport override, see [`crate::entrypoint::TransportOverride`].
    #[serde(alias = "entryPointTransport", skip_serializing_if = "Option::is_none")]
    pub entry_point_transport: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TcpRouter {
    #[serde(alias = "entryPoints")]
    pub entry_points: Vec<String>,

    pub rule: String,

    pub service: String,

    pub priority: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct UdpRouter {
    #[serde(alias = "entryPoints")]
    pub entry_points: Vec<String>,

    pub service: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_config_from_toml() {
        let raw = r#"
            [entry_points.web]
            address = ":8080"

            [entry_points.dns]
            address = ":5353/udp"

            [transport.respondingTimeouts]
            readTimeout = "3s"
            writeTimeout = 3
            idleTimeout = "3m"

            [lifecycle]
            drain_delay = "500ms"
        "#;
        let config: StaticConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.entry_points.len(), 2);
        assert!(config.entry_points["web"].http);
        assert_eq!(config.transport.responding_timeouts.write_timeout, Duration::from_secs(3));
        assert_eq!(config.transport.responding_timeouts.idle_timeout, Duration::from_secs(180));
        assert_eq!(config.lifecycle.drain_delay, Duration::from_millis(500));
    }

    #[test]
    fn dynamic_config_accepts_both_spellings() {
        let toml_raw = r#"
            [http.routers.foo]
            entry_points = ["web", "http-30001"]
            entry_point_transport = '{"respondingTimeouts":{"readTimeout":3}}'

            [udp.routers.dns]
            entry_points = ["udp-30004"]
        "#;
        let from_toml: DynamicConfig = toml::from_str(toml_raw).unwrap();

        let json_raw = r#"{
            "http": {"routers": {"foo": {
                "entryPoints": ["web", "http-30001"],
                "entryPointTransport": "{\"respondingTimeouts\":{\"readTimeout\":3}}"
            }}},
            "udp": {"routers": {"dns": {"entryPoints": ["udp-30004"]}}}
        }"#;
        let from_json: DynamicConfig = serde_json::from_str(json_raw).unwrap();

        assert_eq!(from_toml, from_json);
        assert!(from_toml.tcp.routers.is_empty());
        assert!(!from_toml.is_empty());
    }
}
