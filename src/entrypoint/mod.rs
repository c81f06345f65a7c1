//! Entry point model.
//!
//! # Data Flow
//! ```text
//! static config entry      router-referenced name ("http-30001")
//!     → address.rs             → spec.rs (synthesize, validate)
//!     → EntryPointDefinition ← ┘
//!     → set_defaults (transport.rs defaults)
//!
//! HTTP router override blob
//!     → transport.rs (parse, merge over defaults)
//!     → EntryPointTransport applied to definition and live listener
//! ```
//!
//! # Design Decisions
//! - Synthesis is a pure function; an invalid name has no side effect
//! - `http` always resolves to a TCP listener
//! - Override parse failures degrade to defaults, never to errors

pub mod address;
pub mod spec;
pub mod transport;

use std::collections::BTreeMap;

pub use address::{AddressError, EntryPointAddress, Transport};
pub use spec::{EntryPointDefinition, MalformedEntryPointName, ProtocolTag};
pub use transport::{
    parse_router_override, EntryPointTransport, InvalidOverride, RespondingTimeouts,
    TransportOverride,
};

/// Entry point definitions keyed by name.
pub type EntryPoints = BTreeMap<String, EntryPointDefinition>;
