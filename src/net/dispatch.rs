//! Hand-off from listeners to whatever serves their traffic.
//!
//! Listeners only own sockets and loops; the work done with an accepted
//! stream, an HTTP request or a datagram is supplied by a [`Dispatcher`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use futures_util::future::BoxFuture;
use tokio::net::{TcpStream, UdpSocket};

/// A datagram received by a UDP entry point.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Bytes,
    pub peer: SocketAddr,
    /// Socket the datagram arrived on, for replies.
    pub socket: Arc<UdpSocket>,
}

/// Serves the traffic accepted by entry point listeners.
pub trait Dispatcher: Send + Sync + 'static {
    /// Router serving one HTTP connection on an HTTP-capable TCP entry point.
    fn http_router(&self, entry_point: &str) -> axum::Router;

    /// Serve a raw TCP stream accepted by a plain TCP entry point.
    fn serve_tcp(&self, entry_point: &str, stream: TcpStream, peer: SocketAddr) -> BoxFuture<'static, ()>;

    /// Serve one datagram received by a UDP entry point.
    fn serve_udp(&self, entry_point: &str, datagram: Datagram) -> BoxFuture<'static, ()>;
}

/// Shared dispatcher handle.
pub type SharedDispatcher = Arc<dyn Dispatcher>;
