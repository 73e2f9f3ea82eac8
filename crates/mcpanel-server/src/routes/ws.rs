//! WebSocket upgrade.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use tracing::warn;

use crate::server::AppState;
use crate::websocket::PanelSnapshot;

pub(super) async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let max = state.hub.config().max_message_size;
    ws.max_message_size(max)
        .on_upgrade(move |socket| accept(socket, addr, state))
}

async fn accept(socket: WebSocket, addr: SocketAddr, state: AppState) {
    if let Err(e) = state.catalog.refresh().await {
        warn!(error = %e, "catalog refresh failed, snapshot uses cached listing");
    }
    let snapshot = PanelSnapshot::new(
        Arc::clone(&state.machine),
        Arc::clone(&state.logs),
        Arc::clone(&state.catalog),
        state.snapshot_lines,
    );
    let _ = state.hub.add_client(socket, addr, &snapshot).await;

    let machine = state.machine;
    let _ = tokio::spawn(async move {
        let _ = machine.reconcile().await;
    });
}
