//! Network layer subsystem: entry point listener handles.
//!
//! # Data Flow
//! ```text
//! EntryPointDefinition
//!     → tcp.rs / udp.rs bind (Created)
//!     → start: accept / receive loop spawned (Running)
//!     → per connection: http.rs (HTTP-capable TCP) or dispatch.rs hand-off
//!     → stop: loop exits, socket dropped, in-flight work drained (Draining)
//!     → remaining work aborted after drain delay (Stopped)
//! ```
//!
//! # Design Decisions
//! - `start` only spawns the loop; it never waits for traffic
//! - `stop` is idempotent and bounded by the drain delay
//! - Only HTTP-capable TCP handles expose live timeout updates

pub mod connection;
pub mod dispatch;
pub mod http;
pub mod tcp;
pub mod udp;

use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use dispatch::{Datagram, Dispatcher, SharedDispatcher};
pub use http::LiveTimeouts;
pub use tcp::{TcpEntryPoint, TcpEntryPoints};
pub use udp::{UdpEntryPoint, UdpEntryPoints};

/// Lifecycle state of a listener handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerState {
    /// Socket bound, loop not yet launched.
    Created,
    /// Loop launched and accepting.
    Running,
    /// No longer accepting; in-flight work is finishing.
    Draining,
    /// Socket released.
    Stopped,
}

impl ListenerState {
    pub fn is_stopping(&self) -> bool {
        matches!(self, ListenerState::Draining | ListenerState::Stopped)
    }
}

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("listener {0} cannot be started: already started or stopped")]
    NotStartable(String),
}

/// State cell shared by a handle and its loops.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    tx: watch::Sender<ListenerState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(ListenerState::Created);
        Self { tx }
    }

    pub(crate) fn state(&self) -> ListenerState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.tx.subscribe()
    }

    /// Created → Running. False if the handle already left Created.
    pub(crate) fn mark_running(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == ListenerState::Created {
                *state = ListenerState::Running;
                true
            } else {
                false
            }
        })
    }

    /// Created/Running → Draining. False if a stop already began.
    pub(crate) fn begin_drain(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_stopping() {
                false
            } else {
                *state = ListenerState::Draining;
                true
            }
        })
    }

    pub(crate) fn mark_stopped(&self) {
        self.tx.send_replace(ListenerState::Stopped);
    }
}

/// Resolve once the watched handle starts stopping (or its sender is gone).
pub(crate) async fn stopping(rx: &mut watch::Receiver<ListenerState>) {
    loop {
        if rx.borrow_and_update().is_stopping() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ListenerState::Created);

        assert!(lifecycle.mark_running());
        assert!(!lifecycle.mark_running());
        assert_eq!(lifecycle.state(), ListenerState::Running);

        assert!(lifecycle.begin_drain());
        assert!(!lifecycle.begin_drain());
        assert_eq!(lifecycle.state(), ListenerState::Draining);

        lifecycle.mark_stopped();
        assert!(!lifecycle.begin_drain());
        assert!(!lifecycle.mark_running());
        assert_eq!(lifecycle.state(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn stopping_resolves_on_drain() {
        let lifecycle = Lifecycle::new();
        let mut rx = lifecycle.subscribe();
        lifecycle.mark_running();

        let waiter = tokio::spawn(async move { stopping(&mut rx).await });
        lifecycle.begin_drain();

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("stopping never resolved")
            .unwrap();
    }
}
