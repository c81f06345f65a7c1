//! HTTP serving on HTTP-capable TCP entry points.
//!
//! # Timeouts
//! - read: hyper header-read timeout, fixed when the connection is accepted
//! - write: deadline for producing each response (504 when exceeded)
//! - idle: keep-alive connections with no request in flight are closed
//!
//! All three come from a [`LiveTimeouts`] cell that reconciliation can
//! overwrite at any time. Open connections are never closed by an update
//! itself; they see new write values on their next request and re-arm
//! the idle watchdog as soon as the cell changes.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tower::ServiceExt;

use crate::entrypoint::RespondingTimeouts;
use crate::net::{lock, stopping, ListenerState};

/// Responding timeouts that can be replaced while connections are open.
#[derive(Debug, Clone)]
pub struct LiveTimeouts {
    current: Arc<ArcSwap<RespondingTimeouts>>,
    changed: Arc<watch::Sender<()>>,
}

impl LiveTimeouts {
    pub fn new(initial: RespondingTimeouts) -> Self {
        let (changed, _) = watch::channel(());
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
            changed: Arc::new(changed),
        }
    }

    pub fn load(&self) -> RespondingTimeouts {
        **self.current.load()
    }

    /// Replace the timeouts and wake every connection watching for changes.
    pub fn store(&self, timeouts: RespondingTimeouts) {
        self.current.store(Arc::new(timeouts));
        self.changed.send_replace(());
    }

    fn subscribe(&self) -> watch::Receiver<()> {
        self.changed.subscribe()
    }
}

/// Request activity of one connection, for the idle watchdog.
#[derive(Debug)]
struct Activity {
    in_flight: AtomicUsize,
    last_active: Mutex<Instant>,
}

impl Activity {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            last_active: Mutex::new(Instant::now()),
        }
    }

    fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight(Arc::clone(self))
    }

    /// When the idle watchdog should look again.
    fn next_check(&self, idle: Duration) -> Instant {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            Instant::now() + idle
        } else {
            *lock(&self.last_active) + idle
        }
    }

    fn idle_for(&self, idle: Duration) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0 && lock(&self.last_active).elapsed() >= idle
    }
}

struct InFlight(Arc<Activity>);

impl Drop for InFlight {
    fn drop(&mut self) {
        *lock(&self.0.last_active) = Instant::now();
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Far enough away to never fire while a watchdog is disabled.
const NEVER: Duration = Duration::from_secs(365 * 24 * 3600);

/// Serve HTTP/1.1 on one accepted connection until it closes.
pub(crate) async fn serve_connection(
    entry_point: Arc<str>,
    stream: TcpStream,
    peer: SocketAddr,
    router: axum::Router,
    timeouts: LiveTimeouts,
    mut state_rx: watch::Receiver<ListenerState>,
) {
    let activity = Arc::new(Activity::new());
    let mut updates = timeouts.subscribe();

    let service = {
        let activity = Arc::clone(&activity);
        let timeouts = timeouts.clone();
        hyper::service::service_fn(move |req: Request<Incoming>| {
            let router = router.clone();
            let in_flight = activity.begin();
            let write_timeout = timeouts.load().write_timeout;
            async move {
                let _in_flight = in_flight;
                if write_timeout.is_zero() {
                    return router.oneshot(req).await;
                }
                match tokio::time::timeout(write_timeout, router.oneshot(req)).await {
                    Ok(response) => response,
                    Err(_) => Ok::<_, Infallible>(StatusCode::GATEWAY_TIMEOUT.into_response()),
                }
            }
        })
    };

    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new()).keep_alive(true);
    // hyper applies its own header timeout unless told otherwise; zero disables it.
    let read_timeout = timeouts.load().read_timeout;
    builder.header_read_timeout((!read_timeout.is_zero()).then_some(read_timeout));

    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut shutting_down = false;
    loop {
        let idle_timeout = timeouts.load().idle_timeout;
        let watchdog = !shutting_down && !idle_timeout.is_zero();
        let next_check = if watchdog {
            activity.next_check(idle_timeout)
        } else {
            Instant::now() + NEVER
        };

        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(entry_point = %entry_point, peer_addr = %peer, error = %e, "HTTP connection error");
                }
                break;
            }
            _ = stopping(&mut state_rx), if !shutting_down => {
                shutting_down = true;
                conn.as_mut().graceful_shutdown();
            }
            _ = tokio::time::sleep_until(next_check), if watchdog => {
                if activity.idle_for(idle_timeout) {
                    tracing::debug!(entry_point = %entry_point, peer_addr = %peer, "Closing idle HTTP connection");
                    shutting_down = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
            Ok(()) = updates.changed(), if !shutting_down => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_timeouts_swap() {
        let live = LiveTimeouts::new(RespondingTimeouts::default());
        let clone = live.clone();

        let updated = RespondingTimeouts {
            read_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(4),
            idle_timeout: Duration::from_secs(180),
        };
        live.store(updated);

        assert_eq!(clone.load(), updated);
    }

    #[tokio::test]
    async fn store_wakes_subscribers() {
        let live = LiveTimeouts::new(RespondingTimeouts::default());
        let mut updates = live.subscribe();

        let waiter = tokio::spawn(async move { updates.changed().await.is_ok() });
        tokio::task::yield_now().await;
        live.store(RespondingTimeouts::default());

        let woke = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(woke);
    }

    #[tokio::test]
    async fn activity_tracks_in_flight_requests() {
        let activity = Arc::new(Activity::new());
        let idle = Duration::from_millis(10);

        let guard = activity.begin();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!activity.idle_for(idle));

        drop(guard);
        assert!(!activity.idle_for(idle));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(activity.idle_for(idle));
    }
}
