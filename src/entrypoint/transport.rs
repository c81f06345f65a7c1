//! Per-router transport overrides.
//!
//! HTTP routers may carry an opaque JSON blob such as
//! `{"respondingTimeouts":{"readTimeout":3,"writeTimeout":"4s"}}`.
//! The blob is merged over the default responding timeouts: a field
//! overrides the default only when it is present and non-zero.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeouts applied by an HTTP-capable listener to its connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RespondingTimeouts {
    /// Deadline for reading request headers. Zero disables it.
    #[serde(with = "crate::config::duration")]
    pub read_timeout: Duration,

    /// Deadline for producing a response. Zero disables it.
    #[serde(with = "crate::config::duration")]
    pub write_timeout: Duration,

    /// Keep-alive idle time before a connection is closed. Zero disables it.
    #[serde(with = "crate::config::duration")]
    pub idle_timeout: Duration,
}

impl Default for RespondingTimeouts {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::ZERO,
            idle_timeout: Duration::from_secs(180),
        }
    }
}

/// Transport settings of an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntryPointTransport {
    pub responding_timeouts: RespondingTimeouts,
}

/// Error raised when an override blob is not valid JSON for the expected shape.
#[derive(Debug, thiserror::Error)]
#[error("invalid entry point transport override: {source}")]
pub struct InvalidOverride {
    #[from]
    source: serde_json::Error,
}

/// The override blob exactly as written: every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportOverride {
    pub responding_timeouts: Option<TimeoutsOverride>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutsOverride {
    #[serde(with = "crate::config::duration::option")]
    pub read_timeout: Option<Duration>,
    #[serde(with = "crate::config::duration::option")]
    pub write_timeout: Option<Duration>,
    #[serde(with = "crate::config::duration::option")]
    pub idle_timeout: Option<Duration>,
}

impl TransportOverride {
    /// Parse a raw override blob. An empty or whitespace-only blob is `None`.
    pub fn parse(blob: &str) -> Result<Option<Self>, InvalidOverride> {
        if blob.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(blob)?))
    }

    /// Merge this override over `defaults`.
    pub fn merge(&self, defaults: &EntryPointTransport) -> EntryPointTransport {
        let mut merged = *defaults;
        if let Some(timeouts) = &self.responding_timeouts {
            let target = &mut merged.responding_timeouts;
            merge_field(&mut target.read_timeout, timeouts.read_timeout);
            merge_field(&mut target.write_timeout, timeouts.write_timeout);
            merge_field(&mut target.idle_timeout, timeouts.idle_timeout);
        }
        merged
    }
}

fn merge_field(target: &mut Duration, value: Option<Duration>) {
    if let Some(v) = value.filter(|v| !v.is_zero()) {
        *target = v;
    }
}

/// Parse a router's optional override blob.
///
/// Parse failures are logged and yield `None`, exactly like an absent blob.
pub fn parse_router_override(router: &str, blob: Option<&str>) -> Option<TransportOverride> {
    match TransportOverride::parse(blob?) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(
                router = %router,
                transport = %blob.unwrap_or_default(),
                error = %e,
                "Failed to parse entry point transport, using defaults"
            );
            crate::observability::metrics::record_invalid_override();
            None
        }
    }
}
