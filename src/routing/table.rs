//! Default router table: records published entry points and answers
//! traffic with "no route" responses.

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::StatusCode;
use axum::Router;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tower_http::trace::TraceLayer;

use crate::entrypoint::EntryPoints;
use crate::net::{Datagram, Dispatcher};
use crate::routing::RouterTableBuilder;

/// Entry point set as last published by the factory.
#[derive(Debug, Default)]
pub struct RouterTable {
    entry_points: ArcSwap<EntryPoints>,
}

impl RouterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the last published set.
    pub fn entry_points(&self) -> Arc<EntryPoints> {
        self.entry_points.load_full()
    }

    pub fn knows(&self, entry_point: &str) -> bool {
        self.entry_points.load().contains_key(entry_point)
    }
}

impl RouterTableBuilder for RouterTable {
    fn update_entry_points(&self, entry_points: &EntryPoints) {
        tracing::debug!(count = entry_points.len(), "Router table received entry points");
        self.entry_points.store(Arc::new(entry_points.clone()));
    }
}

impl Dispatcher for RouterTable {
    fn http_router(&self, entry_point: &str) -> Router {
        let message = if self.knows(entry_point) {
            format!("no router matched on entry point {}", entry_point)
        } else {
            format!("entry point {} is not published", entry_point)
        };

        Router::new()
            .fallback(move || async move { (StatusCode::NOT_FOUND, message) })
            .layer(TraceLayer::new_for_http())
    }

    fn serve_tcp(&self, entry_point: &str, mut stream: TcpStream, peer: SocketAddr) -> BoxFuture<'static, ()> {
        let entry_point = entry_point.to_string();
        async move {
            tracing::debug!(entry_point = %entry_point, peer_addr = %peer, "No TCP router, closing stream");
            let _ = stream.shutdown().await;
        }
        .boxed()
    }

    fn serve_udp(&self, entry_point: &str, datagram: Datagram) -> BoxFuture<'static, ()> {
        tracing::trace!(
            entry_point = %entry_point,
            peer_addr = %datagram.peer,
            bytes = datagram.payload.len(),
            "No UDP router, dropping datagram"
        );
        futures_util::future::ready(()).boxed()
    }
}
