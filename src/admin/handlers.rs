use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::entrypoint::{EntryPoints, RespondingTimeouts, Transport};
use crate::net::ListenerState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub entry_points: usize,
    pub dynamic_entry_points: usize,
}

#[derive(Serialize)]
pub struct ListenerStatus {
    pub name: String,
    pub transport: Transport,
    pub address: String,
    pub state: ListenerState,
    pub active_connections: u64,
    pub live_timeouts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<RespondingTimeouts>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let merged = state.factory.entry_points().await;
    let dynamic = state.factory.dynamic_entry_points().await;

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        entry_points: merged.len(),
        dynamic_entry_points: dynamic.len(),
    })
}

pub async fn get_entry_points(State(state): State<AdminState>) -> Json<EntryPoints> {
    Json(state.factory.entry_points().await)
}

pub async fn get_listeners(State(state): State<AdminState>) -> Json<BTreeMap<String, ListenerStatus>> {
    let mut statuses = BTreeMap::new();

    for (name, ep) in state.factory.server_entry_points_tcp().await {
        statuses.insert(
            name.clone(),
            ListenerStatus {
                name,
                transport: Transport::Tcp,
                address: ep.local_addr().to_string(),
                state: ep.state(),
                active_connections: ep.active_connections(),
                live_timeouts: ep.supports_live_timeout_update(),
                timeouts: ep.timeouts(),
            },
        );
    }
    for (name, ep) in state.factory.server_entry_points_udp().await {
        statuses.insert(
            name.clone(),
            ListenerStatus {
                name,
                transport: Transport::Udp,
                address: ep.local_addr().to_string(),
                state: ep.state(),
                active_connections: ep.active_sessions(),
                live_timeouts: false,
                timeouts: None,
            },
        );
    }

    Json(statuses)
}
