//! Entry point reconciliation for an edge proxy.
//!
//! Routers name the entry points they want; the factory keeps one
//! listener per referenced `<protocol>-<port>` name running, next to the
//! entry points declared statically.

pub mod admin;
pub mod config;
pub mod entrypoint;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod server;

pub use config::{DynamicConfig, StaticConfig};
pub use entrypoint::{EntryPointDefinition, EntryPoints};
pub use lifecycle::Shutdown;
pub use server::EntryPointFactory;
