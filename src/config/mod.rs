//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! static config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → StaticConfig (validated, immutable for the process lifetime)
//!
//! dynamic config file (TOML or JSON)
//!     → watcher.rs detects change
//!     → loader.rs loads routers
//!     → mpsc channel → EntryPointFactory::build_entry_points
//! ```
//!
//! # Design Decisions
//! - Static config is immutable once loaded; only routers are reloaded
//! - All fields have defaults to allow minimal configs
//! - A failed reload keeps the current configuration

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_dynamic_config, load_static_config, ConfigError};
pub use schema::{
    DynamicConfig, EntryPointConfig, HttpRouter, LogFormat, StaticConfig, TcpRouter, UdpRouter,
};
pub use validation::ValidationError;
pub use watcher::ConfigWatcher;
