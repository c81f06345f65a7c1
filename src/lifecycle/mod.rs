//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Static config → bind static entry points → start → factory
//!     Dynamic config updates → reconcile loop (one pass at a time)
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → reconcile loop exits
//!     → factory.shutdown() drains every listener → exit
//! ```
//!
//! # Design Decisions
//! - Static bind failures are fatal; dynamic ones are retried per pass
//! - The reconcile loop is the only caller of `build_entry_points`

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::{run_reconciler, start_entry_points, Started};
