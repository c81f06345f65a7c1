//! Entry points declared in static configuration.
//!
//! Bound once at startup and never created or destroyed by
//! reconciliation. Their names shadow any dynamic entry point.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::StaticConfig;
use crate::entrypoint::{AddressError, EntryPointAddress, EntryPointDefinition, EntryPoints, Transport};
use crate::net::{ListenerError, SharedDispatcher, TcpEntryPoint, TcpEntryPoints, UdpEntryPoint, UdpEntryPoints};

/// Error raised while setting up static entry points. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum StaticEntryPointError {
    #[error("static entry point {name}: {source}")]
    Address {
        name: String,
        #[source]
        source: AddressError,
    },
    #[error("static entry point {name}: {source}")]
    Listener {
        name: String,
        #[source]
        source: ListenerError,
    },
}

/// Immutable set of static definitions and their listeners.
#[derive(Debug, Default)]
pub struct StaticEntryPointSet {
    definitions: EntryPoints,
    tcp: TcpEntryPoints,
    udp: UdpEntryPoints,
}

impl StaticEntryPointSet {
    /// Definitions for every configured entry point, defaults applied.
    pub fn definitions_from_config(config: &StaticConfig) -> Result<EntryPoints, StaticEntryPointError> {
        let mut definitions = EntryPoints::new();
        for (name, ep) in &config.entry_points {
            let address: EntryPointAddress = ep.address.parse().map_err(|source| StaticEntryPointError::Address {
                name: name.clone(),
                source,
            })?;
            let mut definition = EntryPointDefinition::new(name.clone(), address, ep.http);
            definition.set_defaults(ep.transport.as_ref().unwrap_or(&config.transport));
            definitions.insert(name.clone(), definition);
        }
        Ok(definitions)
    }

    /// Bind every static entry point. Listeners are left in `Created`.
    pub async fn bind(config: &StaticConfig) -> Result<Self, StaticEntryPointError> {
        let definitions = Self::definitions_from_config(config)?;
        let mut tcp = TcpEntryPoints::new();
        let mut udp = UdpEntryPoints::new();

        for (name, definition) in &definitions {
            let wrap = |source| StaticEntryPointError::Listener {
                name: name.clone(),
                source,
            };
            match definition.transport_kind() {
                Transport::Tcp => {
                    let ep = TcpEntryPoint::bind(definition, config.lifecycle.drain_delay)
                        .await
                        .map_err(wrap)?;
                    tcp.insert(name.clone(), Arc::new(ep));
                }
                Transport::Udp => {
                    let ep = UdpEntryPoint::bind(definition, config.lifecycle.drain_delay, config.lifecycle.udp_buffer_size)
                        .await
                        .map_err(wrap)?;
                    udp.insert(name.clone(), Arc::new(ep));
                }
            }
        }

        tracing::info!(tcp = tcp.len(), udp = udp.len(), "Static entry points bound");
        Ok(Self { definitions, tcp, udp })
    }

    /// Launch every listener loop.
    pub fn start(&self, dispatcher: &SharedDispatcher) -> Result<(), StaticEntryPointError> {
        for (name, ep) in &self.tcp {
            ep.start(Arc::clone(dispatcher)).map_err(|source| StaticEntryPointError::Listener {
                name: name.clone(),
                source,
            })?;
        }
        for (name, ep) in &self.udp {
            ep.start(Arc::clone(dispatcher)).map_err(|source| StaticEntryPointError::Listener {
                name: name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.definitions.keys().cloned().collect()
    }

    pub fn definitions(&self) -> &EntryPoints {
        &self.definitions
    }

    pub fn tcp(&self) -> &TcpEntryPoints {
        &self.tcp
    }

    pub fn udp(&self) -> &UdpEntryPoints {
        &self.udp
    }
}
