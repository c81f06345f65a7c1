//! Entry point network addresses.
//!
//! Textual form: `[host]:port[/transport]`, e.g. `":8080"`,
//! `"127.0.0.1:53/udp"`. Transport defaults to `tcp`; an empty host
//! binds every interface.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Socket kind an entry point listens with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for address parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address {0:?} has no port")]
    MissingPort(String),
    #[error("address {0:?} has an invalid port")]
    InvalidPort(String),
    #[error("address {0:?} has an unknown transport {1:?}")]
    UnknownTransport(String, String),
    #[error("address {0:?} has an invalid host")]
    InvalidHost(String),
}

/// A listening address: optional host, port and transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPointAddress {
    host: Option<IpAddr>,
    port: u16,
    transport: Transport,
}

impl EntryPointAddress {
    /// An address on every interface.
    pub fn any(port: u16, transport: Transport) -> Self {
        Self { host: None, port, transport }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// The socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.port)
    }
}

impl fmt::Display for EntryPointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host {
            Some(IpAddr::V6(ip)) => write!(f, "[{}]:{}/{}", ip, self.port, self.transport),
            Some(ip) => write!(f, "{}:{}/{}", ip, self.port, self.transport),
            None => write!(f, ":{}/{}", self.port, self.transport),
        }
    }
}

impl FromStr for EntryPointAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hostport, transport) = match s.rsplit_once('/') {
            Some((hp, "tcp")) => (hp, Transport::Tcp),
            Some((hp, "udp")) => (hp, Transport::Udp),
            Some((_, other)) => return Err(AddressError::UnknownTransport(s.to_string(), other.to_string())),
            None => (s, Transport::Tcp),
        };

        let (host, port) = hostport
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;

        let port: u16 = port.parse().map_err(|_| AddressError::InvalidPort(s.to_string()))?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        let host = if host.is_empty() {
            None
        } else {
            Some(host.parse().map_err(|_| AddressError::InvalidHost(s.to_string()))?)
        };

        Ok(Self { host, port, transport })
    }
}

impl Serialize for EntryPointAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntryPointAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_static_forms() {
        let a: EntryPointAddress = ":8080".parse().unwrap();
        assert_eq!(a, EntryPointAddress::any(8080, Transport::Tcp));

        let b: EntryPointAddress = "127.0.0.1:53/udp".parse().unwrap();
        assert_eq!(b.transport(), Transport::Udp);
        assert_eq!(b.socket_addr(), "127.0.0.1:53".parse().unwrap());

        let c: EntryPointAddress = "[::1]:443/tcp".parse().unwrap();
        assert_eq!(c.socket_addr(), "[::1]:443".parse().unwrap());
    }

    #[test]
    fn renders_synthesized_form() {
        assert_eq!(EntryPointAddress::any(30001, Transport::Tcp).to_string(), ":30001/tcp");
        assert_eq!(EntryPointAddress::any(30004, Transport::Udp).to_string(), ":30004/udp");
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(matches!("8080".parse::<EntryPointAddress>(), Err(AddressError::MissingPort(_))));
        assert!(matches!(":http".parse::<EntryPointAddress>(), Err(AddressError::InvalidPort(_))));
        assert!(matches!(":80/sctp".parse::<EntryPointAddress>(), Err(AddressError::UnknownTransport(..))));
        assert!(matches!("nohost:80".parse::<EntryPointAddress>(), Err(AddressError::InvalidHost(_))));
    }
}
