//! TCP entry point listener.
//!
//! # Responsibilities
//! - Bind the entry point address at creation
//! - Run the accept loop once started
//! - Serve HTTP with live timeouts when the entry point carries HTTP,
//!   otherwise hand raw streams to the dispatcher
//! - Drain and release the socket on stop

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::entrypoint::{EntryPointDefinition, RespondingTimeouts, Transport};
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::dispatch::SharedDispatcher;
use crate::net::http::{self, LiveTimeouts};
use crate::net::{lock, stopping, Lifecycle, ListenerError, ListenerState};
use crate::observability::metrics;

/// TCP listener handles keyed by entry point name.
pub type TcpEntryPoints = BTreeMap<String, Arc<TcpEntryPoint>>;

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// A bound TCP socket and its accept loop.
#[derive(Debug)]
pub struct TcpEntryPoint {
    name: Arc<str>,
    local_addr: SocketAddr,
    /// Present only when the entry point carries HTTP.
    http: Option<LiveTimeouts>,
    lifecycle: Lifecycle,
    tracker: ConnectionTracker,
    drain_delay: Duration,
    pending: Mutex<Option<TcpListener>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpEntryPoint {
    /// Bind the definition's address. The handle starts in `Created`.
    pub async fn bind(definition: &EntryPointDefinition, drain_delay: Duration) -> Result<Self, ListenerError> {
        let address = definition.address.socket_addr();
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ListenerError::Bind { address, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind { address, source })?;

        tracing::debug!(entry_point = %definition.name, address = %local_addr, http = definition.http, "TCP listener bound");

        Ok(Self {
            name: Arc::from(definition.name.as_str()),
            local_addr,
            http: definition
                .http
                .then(|| LiveTimeouts::new(definition.transport.responding_timeouts)),
            lifecycle: Lifecycle::new(),
            tracker: ConnectionTracker::new(),
            drain_delay,
            pending: Mutex::new(Some(listener)),
            accept_task: Mutex::new(None),
        })
    }

    /// Launch the accept loop. Returns as soon as the loop is spawned.
    pub fn start(&self, dispatcher: SharedDispatcher) -> Result<(), ListenerError> {
        let listener = lock(&self.pending)
            .take()
            .ok_or_else(|| ListenerError::NotStartable(self.name.to_string()))?;

        let ctx = AcceptContext {
            name: Arc::clone(&self.name),
            http: self.http.clone(),
            tracker: self.tracker.clone(),
            state_rx: self.lifecycle.subscribe(),
            drain_delay: self.drain_delay,
            dispatcher,
        };
        *lock(&self.accept_task) = Some(tokio::spawn(accept_loop(ctx, listener)));

        if !self.lifecycle.mark_running() {
            return Err(ListenerError::NotStartable(self.name.to_string()));
        }

        tracing::info!(entry_point = %self.name, address = %self.local_addr, http = self.http.is_some(), "TCP entry point started");
        metrics::record_listener_started(Transport::Tcp);
        Ok(())
    }

    /// Stop accepting, drain in-flight connections, release the socket.
    ///
    /// Calling it on a stopping or stopped handle does nothing.
    pub async fn stop(&self) {
        if !self.lifecycle.begin_drain() {
            return;
        }
        tracing::info!(
            entry_point = %self.name,
            address = %self.local_addr,
            active_connections = self.tracker.active_count(),
            "Stopping TCP entry point"
        );

        drop(lock(&self.pending).take());
        let task = lock(&self.accept_task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(entry_point = %self.name, error = %e, "TCP accept loop ended abnormally");
            }
        }

        self.lifecycle.mark_stopped();
        metrics::record_listener_stopped(Transport::Tcp);
        tracing::info!(entry_point = %self.name, "TCP entry point stopped");
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

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Whether this handle serves HTTP and can change timeouts live.
    pub fn supports_live_timeout_update(&self) -> bool {
        self.http.is_some()
    }

    /// Current responding timeouts, for HTTP-capable handles.
    pub fn timeouts(&self) -> Option<RespondingTimeouts> {
        self.http.as_ref().map(LiveTimeouts::load)
    }

    /// Replace the responding timeouts without touching open connections.
    /// Returns false when the handle has no HTTP server.
    pub fn update_timeouts(&self, timeouts: RespondingTimeouts) -> bool {
        match &self.http {
            Some(live) => {
                live.store(timeouts);
                true
            }
            None => false,
        }
    }
}

struct AcceptContext {
    name: Arc<str>,
    http: Option<LiveTimeouts>,
    tracker: ConnectionTracker,
    state_rx: watch::Receiver<ListenerState>,
    drain_delay: Duration,
    dispatcher: SharedDispatcher,
}

impl AcceptContext {
    fn serve(&self, stream: TcpStream, peer: SocketAddr, guard: ConnectionGuard) -> impl std::future::Future<Output = ()> + Send + 'static {
        let name = Arc::clone(&self.name);
        let http = self.http.clone();
        let state_rx = self.state_rx.clone();
        let dispatcher = Arc::clone(&self.dispatcher);

        async move {
            tracing::debug!(entry_point = %name, peer_addr = %peer, connection_id = %guard.id(), "Connection accepted");
            match http {
                Some(timeouts) => {
                    let router = dispatcher.http_router(&name);
                    http::serve_connection(Arc::clone(&name), stream, peer, router, timeouts, state_rx).await;
                }
                None => dispatcher.serve_tcp(&name, stream, peer).await,
            }
            drop(guard);
        }
    }
}

async fn accept_loop(ctx: AcceptContext, listener: TcpListener) {
    let mut state_rx = ctx.state_rx.clone();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = stopping(&mut state_rx) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let guard = ctx.tracker.track();
                    connections.spawn(ctx.serve(stream, peer, guard));
                    metrics::record_active_connections(&ctx.name, ctx.tracker.active_count());
                }
                Err(e) => {
                    tracing::warn!(entry_point = %ctx.name, error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    tracing::warn!(entry_point = %ctx.name, error = %e, "Connection task failed");
                }
                metrics::record_active_connections(&ctx.name, ctx.tracker.active_count());
            }
        }
    }

    drop(listener);
    drain(&ctx.name, connections, &ctx.tracker, ctx.drain_delay).await;
    metrics::record_active_connections(&ctx.name, 0);
}

/// Wait up to `delay` for tracked work to finish, then abort the rest.
pub(crate) async fn drain(name: &str, mut tasks: JoinSet<()>, tracker: &ConnectionTracker, delay: Duration) {
    let open = tracker.active_count();
    if open > 0 {
        tracing::info!(entry_point = %name, open_connections = open, drain_delay = ?delay, "Draining connections");
    }

    if tokio::time::timeout(delay, tracker.wait_idle()).await.is_err() {
        tracing::warn!(
            entry_point = %name,
            remaining = tracker.active_count(),
            "Drain delay elapsed, aborting remaining connections"
        );
    }
    tasks.shutdown().await;
}
