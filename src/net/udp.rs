//! UDP entry point listener.
//!
//! # Responsibilities
//! - Bind the datagram socket at creation
//! - Run the receive loop once started, one dispatcher task per datagram
//! - Drain outstanding datagram tasks on stop, then release the socket

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use tokio::net::UdpSocket;
use tokio::task::{JoinHandle, JoinSet};

use crate::entrypoint::{EntryPointDefinition, Transport};
use crate::net::connection::ConnectionTracker;
use crate::net::dispatch::{Datagram, SharedDispatcher};
use crate::net::tcp::drain;
use crate::net::{lock, stopping, Lifecycle, ListenerError, ListenerState};
use crate::observability::metrics;

/// UDP listener handles keyed by entry point name.
pub type UdpEntryPoints = BTreeMap<String, Arc<UdpEntryPoint>>;

/// A bound datagram socket and its receive loop.
#[derive(Debug)]
pub struct UdpEntryPoint {
    name: Arc<str>,
    local_addr: SocketAddr,
    lifecycle: Lifecycle,
    tracker: ConnectionTracker,
    drain_delay: Duration,
    buffer_size: usize,
    pending: Mutex<Option<UdpSocket>>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
}

impl UdpEntryPoint {
    /// Bind the definition's address. The handle starts in `Created`.
    pub async fn bind(
        definition: &EntryPointDefinition,
        drain_delay: Duration,
        buffer_size: usize,
    ) -> Result<Self, ListenerError> {
        let address = definition.address.socket_addr();
        let socket = UdpSocket::bind(address)
            .await
            .map_err(|source| ListenerError::Bind { address, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| ListenerError::Bind { address, source })?;

        tracing::debug!(entry_point = %definition.name, address = %local_addr, "UDP socket bound");

        Ok(Self {
            name: Arc::from(definition.name.as_str()),
            local_addr,
            lifecycle: Lifecycle::new(),
            tracker: ConnectionTracker::new(),
            drain_delay,
            buffer_size: buffer_size.max(1),
            pending: Mutex::new(Some(socket)),
            receive_task: Mutex::new(None),
        })
    }

    /// Launch the receive loop. Returns as soon as the loop is spawned.
    pub fn start(&self, dispatcher: SharedDispatcher) -> Result<(), ListenerError> {
        let socket = lock(&self.pending)
            .take()
            .ok_or_else(|| ListenerError::NotStartable(self.name.to_string()))?;

        let task = tokio::spawn(receive_loop(
            Arc::clone(&self.name),
            Arc::new(socket),
            self.lifecycle.subscribe(),
            self.tracker.clone(),
            dispatcher,
            self.buffer_size,
            self.drain_delay,
        ));
        *lock(&self.receive_task) = Some(task);

        if !self.lifecycle.mark_running() {
            return Err(ListenerError::NotStartable(self.name.to_string()));
        }

        tracing::info!(entry_point = %self.name, address = %self.local_addr, "UDP entry point started");
        metrics::record_listener_started(Transport::Udp);
        Ok(())
    }

    /// Stop receiving, drain outstanding datagrams, release the socket.
    ///
    /// Calling it on a stopping or stopped handle does nothing.
    pub async fn stop(&self) {
        if !self.lifecycle.begin_drain() {
            return;
        }
        tracing::info!(entry_point = %self.name, address = %self.local_addr, "Stopping UDP entry point");

        drop(lock(&self.pending).take());
        let task = lock(&self.receive_task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(entry_point = %self.name, error = %e, "UDP receive loop ended abnormally");
            }
        }

        self.lifecycle.mark_stopped();
        metrics::record_listener_stopped(Transport::Udp);
        tracing::info!(entry_point = %self.name, "UDP entry point stopped");
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ListenerState {
        self.lifecycle.state()
    }

    /// Datagrams currently being served.
    pub fn active_sessions(&self) -> u64 {
        self.tracker.active_count()
    }
}

async fn receive_loop(
    name: Arc<str>,
    socket: Arc<UdpSocket>,
    mut state_rx: tokio::sync::watch::Receiver<ListenerState>,
    tracker: ConnectionTracker,
    dispatcher: SharedDispatcher,
    buffer_size: usize,
    drain_delay: Duration,
) {
    let mut buf = vec![0u8; buffer_size];
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = stopping(&mut state_rx) => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, peer)) => {
                    tracing::trace!(entry_point = %name, peer_addr = %peer, bytes = len, "Datagram received");
                    let guard = tracker.track();
                    let served = dispatcher.serve_udp(&name, Datagram {
                        payload: Bytes::copy_from_slice(&buf[..len]),
                        peer,
                        socket: Arc::clone(&socket),
                    });
                    sessions.spawn(async move {
                        served.await;
                        drop(guard);
                    });
                }
                Err(e) => {
                    // ICMP port-unreachable from an earlier reply surfaces here on some platforms.
                    tracing::debug!(entry_point = %name, error = %e, "UDP receive error");
                }
            },
            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = joined {
                    tracing::warn!(entry_point = %name, error = %e, "Datagram task failed");
                }
            }
        }
    }

    drop(socket);
    drain(&name, sessions, &tracker, drain_delay).await;
}
