//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use edge_entrypoints::config::{EntryPointConfig, HttpRouter, StaticConfig, TcpRouter, UdpRouter};
use edge_entrypoints::entrypoint::EntryPoints;
use edge_entrypoints::net::{Datagram, Dispatcher, SharedDispatcher};
use edge_entrypoints::routing::{RouterTable, RouterTableBuilder};
use edge_entrypoints::server::{EntryPointFactory, FactorySettings, StaticEntryPointSet};
use edge_entrypoints::DynamicConfig;

/// Router table that remembers every publication.
#[derive(Debug, Default)]
pub struct RecordingTable {
    pub table: RouterTable,
    publishes: AtomicUsize,
    last: Mutex<EntryPoints>,
}

impl RecordingTable {
    pub fn publishes(&self) -> usize {
        self.publishes.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> EntryPoints {
        self.last.lock().unwrap().clone()
    }
}

impl RouterTableBuilder for RecordingTable {
    fn update_entry_points(&self, entry_points: &EntryPoints) {
        self.publishes.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = entry_points.clone();
        self.table.update_entry_points(entry_points);
    }
}

/// Dispatcher with real handlers: `/` echoes the entry point name,
/// `/slow` answers after `slow_for`, TCP streams and datagrams are echoed.
#[derive(Debug, Clone)]
pub struct EchoDispatcher {
    pub slow_for: Duration,
}

impl Default for EchoDispatcher {
    fn default() -> Self {
        Self {
            slow_for: Duration::from_millis(500),
        }
    }
}

impl Dispatcher for EchoDispatcher {
    fn http_router(&self, entry_point: &str) -> Router {
        let name = entry_point.to_string();
        let slow_for = self.slow_for;
        Router::new()
            .route("/", get(move || async move { name }))
            .route(
                "/slow",
                get(move || async move {
                    tokio::time::sleep(slow_for).await;
                    "done"
                }),
            )
    }

    fn serve_tcp(&self, _entry_point: &str, mut stream: TcpStream, _peer: SocketAddr) -> BoxFuture<'static, ()> {
        async move {
            let mut buf = [0u8; 1024];
            while let Ok(n) = stream.read(&mut buf).await {
                if n == 0 || stream.write_all(&buf[..n]).await.is_err() {
                    break;
                }
            }
        }
        .boxed()
    }

    fn serve_udp(&self, _entry_point: &str, datagram: Datagram) -> BoxFuture<'static, ()> {
        async move {
            let _ = datagram.socket.send_to(&datagram.payload, datagram.peer).await;
        }
        .boxed()
    }
}

pub fn settings() -> FactorySettings {
    FactorySettings {
        drain_delay: Duration::from_millis(300),
        ..Default::default()
    }
}

/// Static config with the given `(name, address)` entry points.
pub fn static_config(entry_points: &[(&str, &str)]) -> StaticConfig {
    let mut config = StaticConfig::default();
    config.lifecycle.drain_delay = Duration::from_millis(300);
    for (name, address) in entry_points {
        config.entry_points.insert(
            name.to_string(),
            EntryPointConfig {
                address: address.to_string(),
                http: true,
                transport: None,
            },
        );
    }
    config
}

/// Factory over a bound and started static set, publishing to a recording table.
pub async fn factory_with(
    config: &StaticConfig,
    dispatcher: SharedDispatcher,
) -> (Arc<EntryPointFactory>, Arc<RecordingTable>) {
    let table = Arc::new(RecordingTable::default());
    let static_set = StaticEntryPointSet::bind(config).await.unwrap();
    static_set.start(&dispatcher).unwrap();

    let factory = EntryPointFactory::new(
        static_set,
        dispatcher,
        table.clone(),
        FactorySettings::from_config(config),
    );
    (Arc::new(factory), table)
}

/// Builder for dynamic configurations.
#[derive(Debug, Default, Clone)]
pub struct Routers(DynamicConfig);

impl Routers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn http(mut self, name: &str, entry_points: &[&str]) -> Self {
        self.0.http.routers.insert(
            name.into(),
            HttpRouter {
                entry_points: names(entry_points),
                ..Default::default()
            },
        );
        self
    }

    pub fn http_with_transport(mut self, name: &str, entry_points: &[&str], transport: &str) -> Self {
        self.0.http.routers.insert(
            name.into(),
            HttpRouter {
                entry_points: names(entry_points),
                entry_point_transport: Some(transport.into()),
                ..Default::default()
            },
        );
        self
    }

    pub fn tcp(mut self, name: &str, entry_points: &[&str]) -> Self {
        self.0.tcp.routers.insert(
            name.into(),
            TcpRouter {
                entry_points: names(entry_points),
                ..Default::default()
            },
        );
        self
    }

    pub fn udp(mut self, name: &str, entry_points: &[&str]) -> Self {
        self.0.udp.routers.insert(
            name.into(),
            UdpRouter {
                entry_points: names(entry_points),
                ..Default::default()
            },
        );
        self
    }

    pub fn build(self) -> DynamicConfig {
        self.0
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// HTTP client that never reuses connections between tests.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
