//! Entry point reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! DynamicConfig (watcher, one pass at a time)
//!     → plan.rs: wanted names per family, diffed against running listeners
//!     → factory.rs: stop removed → bind/start new → apply overrides
//!     → RouterTableBuilder::update_entry_points(static ∪ dynamic)
//! ```
//!
//! # Design Decisions
//! - Static entry points are bound once at startup and shadow dynamic names
//! - Removed listeners are drained before new ones bind, inside the lock
//! - A failed bind leaves the name out of this pass; the next pass retries it

pub mod factory;
pub mod plan;
pub mod static_set;

pub use factory::{EntryPointFactory, FactorySettings, ReconcileSummary};
pub use plan::{CurrentEntryPoints, ReconcilePlan, WantedEntryPoints};
pub use static_set::{StaticEntryPointError, StaticEntryPointSet};
