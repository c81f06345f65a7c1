//! Entry point factory: reconciles dynamic listeners with router configuration.
//!
//! # Responsibilities
//! - Diff the entry points routers reference against the running ones
//! - Stop listeners nobody references, bind and start newly referenced ones
//! - Apply per-router transport overrides to HTTP-capable entry points
//! - Publish the merged static ∪ dynamic set to the router table
//!
//! All state lives behind one async mutex. Readers take the same lock,
//! so a half-applied pass is never observable.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Mutex;

use crate::config::{DynamicConfig, StaticConfig};
use crate::entrypoint::{
    parse_router_override, EntryPointDefinition, EntryPointTransport, EntryPoints, Transport, TransportOverride,
};
use crate::net::{SharedDispatcher, TcpEntryPoint, TcpEntryPoints, UdpEntryPoint, UdpEntryPoints};
use crate::observability::metrics;
use crate::routing::RouterTableBuilder;
use crate::server::plan::{CurrentEntryPoints, ReconcilePlan, WantedEntryPoints};
use crate::server::static_set::StaticEntryPointSet;

/// Settings the factory applies to every dynamic entry point.
#[derive(Debug, Clone, Copy)]
pub struct FactorySettings {
    /// Transport given to synthesized definitions.
    pub defaults: EntryPointTransport,
    pub drain_delay: Duration,
    pub udp_buffer_size: usize,
}

impl FactorySettings {
    pub fn from_config(config: &StaticConfig) -> Self {
        Self {
            defaults: config.transport,
            drain_delay: config.lifecycle.drain_delay,
            udp_buffer_size: config.lifecycle.udp_buffer_size,
        }
    }
}

impl Default for FactorySettings {
    fn default() -> Self {
        Self::from_config(&StaticConfig::default())
    }
}

/// Counts describing one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub started: usize,
    pub stopped: usize,
    pub kept: usize,
    pub skipped: usize,
    pub bind_failures: usize,
}

struct FactoryState {
    static_set: StaticEntryPointSet,
    /// Static definitions as published, overrides applied.
    static_definitions: EntryPoints,
    dynamic_definitions: EntryPoints,
    dynamic_tcp: TcpEntryPoints,
    dynamic_udp: UdpEntryPoints,
}

impl FactoryState {
    fn current(&self) -> CurrentEntryPoints {
        CurrentEntryPoints {
            static_names: self.static_set.names(),
            dynamic_tcp: self.dynamic_tcp.keys().cloned().collect(),
            dynamic_udp: self.dynamic_udp.keys().cloned().collect(),
        }
    }

    fn merged_definitions(&self) -> EntryPoints {
        let mut merged = self.dynamic_definitions.clone();
        merged.extend(self.static_definitions.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    fn merged_tcp(&self) -> TcpEntryPoints {
        let mut merged = self.dynamic_tcp.clone();
        merged.extend(self.static_set.tcp().iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
        merged
    }

    fn merged_udp(&self) -> UdpEntryPoints {
        let mut merged = self.dynamic_udp.clone();
        merged.extend(self.static_set.udp().iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
        merged
    }

    /// Resolve `parsed` over the entry point's baseline and apply it.
    ///
    /// The baseline is the configured transport for static entry points
    /// and the factory defaults for dynamic ones. Static names win.
    fn apply_override(&mut self, entry_point: &str, parsed: Option<&TransportOverride>, defaults: &EntryPointTransport) {
        let resolve = |baseline: &EntryPointTransport| parsed.map_or(*baseline, |o| o.merge(baseline));

        if let Some(configured) = self.static_set.definitions().get(entry_point) {
            if !configured.http {
                return;
            }
            let resolved = resolve(&configured.transport);
            if let Some(handle) = self.static_set.tcp().get(entry_point) {
                handle.update_timeouts(resolved.responding_timeouts);
            }
            if let Some(definition) = self.static_definitions.get_mut(entry_point) {
                definition.transport = resolved;
            }
            return;
        }

        let Some(definition) = self.dynamic_definitions.get_mut(entry_point) else {
            return;
        };
        if !definition.http {
            return;
        }
        let resolved = resolve(defaults);
        definition.transport = resolved;
        if let Some(handle) = self.dynamic_tcp.get(entry_point) {
            handle.update_timeouts(resolved.responding_timeouts);
        }
    }
}

/// Owner of every entry point listener.
pub struct EntryPointFactory {
    state: Mutex<FactoryState>,
    dispatcher: SharedDispatcher,
    router_table: Arc<dyn RouterTableBuilder>,
    settings: FactorySettings,
}

impl EntryPointFactory {
    pub fn new(
        static_set: StaticEntryPointSet,
        dispatcher: SharedDispatcher,
        router_table: Arc<dyn RouterTableBuilder>,
        settings: FactorySettings,
    ) -> Self {
        let static_definitions = static_set.definitions().clone();
        Self {
            state: Mutex::new(FactoryState {
                static_set,
                static_definitions,
                dynamic_definitions: EntryPoints::new(),
                dynamic_tcp: TcpEntryPoints::new(),
                dynamic_udp: UdpEntryPoints::new(),
            }),
            dispatcher,
            router_table,
            settings,
        }
    }

    pub fn settings(&self) -> &FactorySettings {
        &self.settings
    }

    /// Reconcile listeners with `config` and publish the merged set.
    ///
    /// Never fails: malformed names, bad overrides and bind errors are
    /// logged and the affected entry point stays unreachable until the
    /// next pass. Concurrent calls queue on the state lock.
    pub async fn build_entry_points(&self, config: &DynamicConfig) -> ReconcileSummary {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        metrics::record_reconciliation();

        let wanted = WantedEntryPoints::collect(config);
        let plan = ReconcilePlan::compute(&wanted, &state.current());

        for (name, reason) in &plan.skipped {
            tracing::warn!(entry_point = %name, reason = %reason, "Skipping entry point with malformed name");
            metrics::record_malformed_name(reason.reason());
        }

        let unchanged = plan.is_noop();
        let mut summary = ReconcileSummary {
            kept: plan.kept_tcp.len() + plan.kept_udp.len(),
            skipped: plan.skipped.len(),
            ..Default::default()
        };

        // Release removed sockets first so a port can be reused in the same pass.
        summary.stopped = self.stop_removed(state, &plan).await;

        let mut definitions = EntryPoints::new();
        for name in plan.kept_tcp.iter().chain(&plan.kept_udp) {
            if let Some(definition) = state.dynamic_definitions.get(name) {
                definitions.insert(name.clone(), definition.clone());
            }
        }

        for (name, mut definition) in plan.new {
            definition.set_defaults(&self.settings.defaults);
            if self.start_listener(state, &definition).await {
                summary.started += 1;
                definitions.insert(name, definition);
            } else {
                summary.bind_failures += 1;
            }
        }
        state.dynamic_definitions = definitions;

        for (router, rt) in &config.http.routers {
            let parsed = parse_router_override(router, rt.entry_point_transport.as_deref());
            for entry_point in &rt.entry_points {
                state.apply_override(entry_point, parsed.as_ref(), &self.settings.defaults);
            }
        }

        metrics::record_dynamic_listeners(Transport::Tcp, state.dynamic_tcp.len());
        metrics::record_dynamic_listeners(Transport::Udp, state.dynamic_udp.len());

        let merged = state.merged_definitions();
        self.router_table.update_entry_points(&merged);

        if unchanged {
            tracing::debug!(entry_points = merged.len(), "Entry points unchanged");
        } else {
            tracing::info!(
                started = summary.started,
                stopped = summary.stopped,
                kept = summary.kept,
                skipped = summary.skipped,
                bind_failures = summary.bind_failures,
                dynamic_tcp = state.dynamic_tcp.len(),
                dynamic_udp = state.dynamic_udp.len(),
                "Entry points reconciled"
            );
        }
        summary
    }

    /// Remove every planned removal from the maps, then drain them together.
    async fn stop_removed(&self, state: &mut FactoryState, plan: &ReconcilePlan) -> usize {
        let tcp: Vec<Arc<TcpEntryPoint>> = plan
            .removed_tcp
            .iter()
            .filter_map(|name| state.dynamic_tcp.remove(name))
            .collect();
        let udp: Vec<Arc<UdpEntryPoint>> = plan
            .removed_udp
            .iter()
            .filter_map(|name| state.dynamic_udp.remove(name))
            .collect();

        if tcp.is_empty() && udp.is_empty() {
            return 0;
        }

        tokio::join!(
            join_all(tcp.iter().map(|ep| ep.stop())),
            join_all(udp.iter().map(|ep| ep.stop())),
        );
        tcp.len() + udp.len()
    }

    /// Bind and start a listener for a new definition. False on failure.
    async fn start_listener(&self, state: &mut FactoryState, definition: &EntryPointDefinition) -> bool {
        let transport = definition.transport_kind();
        let started = match transport {
            Transport::Tcp => match TcpEntryPoint::bind(definition, self.settings.drain_delay).await {
                Ok(ep) => {
                    let ep = Arc::new(ep);
                    ep.start(Arc::clone(&self.dispatcher)).map(|()| {
                        state.dynamic_tcp.insert(definition.name.clone(), ep);
                    })
                }
                Err(e) => Err(e),
            },
            Transport::Udp => {
                match UdpEntryPoint::bind(definition, self.settings.drain_delay, self.settings.udp_buffer_size).await {
                    Ok(ep) => {
                        let ep = Arc::new(ep);
                        ep.start(Arc::clone(&self.dispatcher)).map(|()| {
                            state.dynamic_udp.insert(definition.name.clone(), ep);
                        })
                    }
                    Err(e) => Err(e),
                }
            }
        };

        match started {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    entry_point = %definition.name,
                    address = %definition.address,
                    error = %e,
                    "Failed to start entry point, will retry on next reconciliation"
                );
                metrics::record_bind_failure(transport);
                false
            }
        }
    }

    /// Merged static and dynamic definitions. Static names win.
    pub async fn entry_points(&self) -> EntryPoints {
        self.state.lock().await.merged_definitions()
    }

    /// Dynamic definitions only.
    pub async fn dynamic_entry_points(&self) -> EntryPoints {
        self.state.lock().await.dynamic_definitions.clone()
    }

    /// Merged static and dynamic TCP listener handles.
    pub async fn server_entry_points_tcp(&self) -> TcpEntryPoints {
        self.state.lock().await.merged_tcp()
    }

    /// Merged static and dynamic UDP listener handles.
    pub async fn server_entry_points_udp(&self) -> UdpEntryPoints {
        self.state.lock().await.merged_udp()
    }

    /// Stop every listener, static and dynamic, and forget the dynamic ones.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        let tcp: Vec<_> = std::mem::take(&mut state.dynamic_tcp)
            .into_values()
            .chain(state.static_set.tcp().values().cloned())
            .collect();
        let udp: Vec<_> = std::mem::take(&mut state.dynamic_udp)
            .into_values()
            .chain(state.static_set.udp().values().cloned())
            .collect();
        state.dynamic_definitions.clear();

        tracing::info!(tcp = tcp.len(), udp = udp.len(), "Stopping all entry points");
        tokio::join!(
            join_all(tcp.iter().map(|ep| ep.stop())),
            join_all(udp.iter().map(|ep| ep.stop())),
        );
        metrics::record_dynamic_listeners(Transport::Tcp, 0);
        metrics::record_dynamic_listeners(Transport::Udp, 0);
    }
}

impl std::fmt::Debug for EntryPointFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPointFactory")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
