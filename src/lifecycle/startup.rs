//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind and start static entry points (fail fast)
//! - Build the factory around the router table
//! - Feed dynamic configuration updates to the factory, one pass at a time

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::config::{DynamicConfig, StaticConfig};
use crate::net::SharedDispatcher;
use crate::routing::RouterTable;
use crate::server::{EntryPointFactory, FactorySettings, StaticEntryPointError, StaticEntryPointSet};

/// Everything a running process needs to keep alive.
#[derive(Debug, Clone)]
pub struct Started {
    pub factory: Arc<EntryPointFactory>,
    pub router_table: Arc<RouterTable>,
}

/// Bind every static entry point, start it, and wrap it in a factory.
pub async fn start_entry_points(config: &StaticConfig) -> Result<Started, StaticEntryPointError> {
    let router_table = Arc::new(RouterTable::new());
    let dispatcher: SharedDispatcher = router_table.clone();

    let static_set = StaticEntryPointSet::bind(config).await?;
    static_set.start(&dispatcher)?;

    let factory = Arc::new(EntryPointFactory::new(
        static_set,
        dispatcher,
        router_table.clone(),
        FactorySettings::from_config(config),
    ));

    Ok(Started { factory, router_table })
}

/// Apply configuration updates until the channel closes or shutdown fires.
///
/// Updates that queued up while a pass was running are coalesced: only
/// the newest one is applied.
pub async fn run_reconciler(
    factory: Arc<EntryPointFactory>,
    mut updates: mpsc::UnboundedReceiver<DynamicConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let mut config = tokio::select! {
            _ = shutdown.recv() => break,
            update = updates.recv() => match update {
                Some(config) => config,
                None => break,
            },
        };
        while let Ok(newer) = updates.try_recv() {
            config = newer;
        }

        factory.build_entry_points(&config).await;
    }
    tracing::debug!("Reconcile loop stopped");
}
