//! Routing subsystem boundary.
//!
//! # Data Flow
//! ```text
//! EntryPointFactory (after every reconciliation pass)
//!     → RouterTableBuilder::update_entry_points(merged static ∪ dynamic)
//!     → table.rs keeps the published set
//!
//! Listeners (per connection / datagram)
//!     → Dispatcher (table.rs) → served response
//! ```
//!
//! # Design Decisions
//! - Rule evaluation and proxying live outside this crate; the table
//!   only answers for entry points it knows about
//! - The published set is swapped atomically, readers never lock

pub mod table;

use crate::entrypoint::EntryPoints;

/// Consumer of the merged entry point view, called once per reconciliation pass.
pub trait RouterTableBuilder: Send + Sync {
    fn update_entry_points(&self, entry_points: &EntryPoints);
}

pub use table::RouterTable;
