//! Entry point definitions and name synthesis.
//!
//! A dynamic entry point name has exactly two tokens joined by `-`:
//! `<protocolTag>-<port>`, with `protocolTag` one of `http`, `tcp`,
//! `udp` and `port` in `1..=65535`. `http` rides a TCP listener.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::entrypoint::address::{EntryPointAddress, Transport};
use crate::entrypoint::transport::EntryPointTransport;

const SEPARATOR: char = '-';

/// Protocol tag of a synthesized entry point name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolTag {
    Http,
    Tcp,
    Udp,
}

impl ProtocolTag {
    /// Listener transport the tag resolves to.
    pub fn transport(&self) -> Transport {
        match self {
            ProtocolTag::Http | ProtocolTag::Tcp => Transport::Tcp,
            ProtocolTag::Udp => Transport::Udp,
        }
    }
}

impl FromStr for ProtocolTag {
    type Err = MalformedEntryPointName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(ProtocolTag::Http),
            "tcp" => Ok(ProtocolTag::Tcp),
            "udp" => Ok(ProtocolTag::Udp),
            other => Err(MalformedEntryPointName::UnknownProtocol(other.to_string())),
        }
    }
}

/// Why a name could not be turned into an entry point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedEntryPointName {
    #[error("expected <protocol>-<port>, found {0} token(s)")]
    TokenCount(usize),
    #[error("unknown protocol tag {0:?}")]
    UnknownProtocol(String),
    #[error("port {0:?} is not in 1..=65535")]
    InvalidPort(String),
    #[error("{transport} entry point cannot serve {family} routers")]
    TransportMismatch { transport: Transport, family: Transport },
}

impl MalformedEntryPointName {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            MalformedEntryPointName::TokenCount(_) => "token_count",
            MalformedEntryPointName::UnknownProtocol(_) => "unknown_protocol",
            MalformedEntryPointName::InvalidPort(_) => "invalid_port",
            MalformedEntryPointName::TransportMismatch { .. } => "transport_mismatch",
        }
    }
}

/// A fully described entry point, static or synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPointDefinition {
    pub name: String,
    pub address: EntryPointAddress,
    /// Whether a TCP entry point serves HTTP (and so supports live timeouts).
    pub http: bool,
    pub transport: EntryPointTransport,
    /// Set once defaults have been applied.
    #[serde(skip)]
    pub defaulted: bool,
}

impl EntryPointDefinition {
    pub fn new(name: impl Into<String>, address: EntryPointAddress, http: bool) -> Self {
        Self {
            name: name.into(),
            http: http && address.transport() == Transport::Tcp,
            address,
            transport: EntryPointTransport::default(),
            defaulted: false,
        }
    }

    /// Synthesize a definition from a `<protocolTag>-<port>` name.
    pub fn synthesize(name: &str) -> Result<Self, MalformedEntryPointName> {
        let tokens: Vec<&str> = name.split(SEPARATOR).collect();
        let [tag, port] = tokens.as_slice() else {
            return Err(MalformedEntryPointName::TokenCount(tokens.len()));
        };

        let tag: ProtocolTag = tag.parse()?;
        let port = parse_port(port)?;

        Ok(Self::new(
            name,
            EntryPointAddress::any(port, tag.transport()),
            tag == ProtocolTag::Http,
        ))
    }

    /// Fill transport settings from the configured defaults.
    pub fn set_defaults(&mut self, defaults: &EntryPointTransport) {
        self.transport = *defaults;
        self.defaulted = true;
    }

    pub fn transport_kind(&self) -> Transport {
        self.address.transport()
    }
}

impl fmt::Display for EntryPointDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

fn parse_port(raw: &str) -> Result<u16, MalformedEntryPointName> {
    let invalid = || MalformedEntryPointName::InvalidPort(raw.to_string());
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    match raw.parse::<u32>() {
        Ok(port @ 1..=65535) => Ok(port as u16),
        _ => Err(invalid()),
    }
}
