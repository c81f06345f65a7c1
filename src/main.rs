//! Edge entry point daemon.
//!
//! ```text
//!   static config ──▶ StaticEntryPointSet (bound once)
//!                              │
//!   dynamic config ──▶ watcher ──▶ reconcile loop ──▶ EntryPointFactory
//!                                                        │        │
//!                              dynamic listeners ◀───────┘        ▼
//!                                                          RouterTable
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_entrypoints::admin::{self, AdminState};
use edge_entrypoints::config::{load_static_config, ConfigWatcher, DynamicConfig};
use edge_entrypoints::lifecycle::{run_reconciler, shutdown_signal, start_entry_points, Shutdown};
use edge_entrypoints::observability::{logging::init_logging, metrics::init_metrics};

#[derive(Parser)]
#[command(name = "edge-entrypoints", version)]
#[command(about = "Keeps proxy entry points in sync with router configuration", long_about = None)]
struct Args {
    /// Static configuration file (TOML).
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Dynamic router configuration (TOML or JSON). Overrides `providers.file`.
    #[arg(short, long)]
    dynamic: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_static_config(&args.config)?;

    init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        static_entry_points = config.entry_points.len(),
        "edge-entrypoints starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let started = start_entry_points(&config).await?;
    let factory = started.factory.clone();
    let shutdown = Shutdown::new();

    let mut _file_watcher = None;
    let reconciler = match args.dynamic.or_else(|| config.providers.file.clone()) {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path);
            watcher.load_initial()?;
            if config.providers.watch {
                _file_watcher = Some(watcher.run()?);
            }
            Some(tokio::spawn(run_reconciler(factory.clone(), updates, shutdown.subscribe())))
        }
        None => {
            tracing::warn!("No dynamic configuration provider, serving static entry points only");
            factory.build_entry_points(&DynamicConfig::default()).await;
            None
        }
    };

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            factory: factory.clone(),
            api_key: config.admin.api_key.as_str().into(),
        };
        Some(tokio::spawn(admin::serve(listener, state, shutdown.wait())))
    } else {
        None
    };

    shutdown_signal().await;
    shutdown.trigger();

    if let Some(task) = reconciler {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Reconcile loop panicked");
        }
    }
    factory.shutdown().await;

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin API task panicked"),
            Ok(Ok(())) => {}
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
