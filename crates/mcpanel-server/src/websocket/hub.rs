//! Connection registry and event fan-out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::WebSocket;
use futures::StreamExt;
use mcpanel_core::{ConnectionId, InboundFrame, ServerEvent};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use super::connection::{Connection, SendError};
use super::heartbeat::Heartbeat;
use super::pumps;
use super::router::{EventRouter, RouteError};
use super::snapshot::SnapshotSource;

/// Per-connection limits applied by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Outbound queue capacity per connection.
    pub queue_capacity: usize,
    /// Keepalive timing.
    pub heartbeat: Heartbeat,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 500,
            heartbeat: Heartbeat::default(),
            max_message_size: 512,
        }
    }
}

/// Owns the live connections.
///
/// The connection map is only mutated under its write lock. Broadcasts hold
/// the read lock and never block on a client: a full queue schedules that
/// client's removal instead.
pub struct Hub {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    router: EventRouter,
    config: HubConfig,
    removed_total: AtomicU64,
}

impl Hub {
    /// Create a hub dispatching inbound frames through `router`.
    pub fn new(config: HubConfig, router: EventRouter) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            router,
            config,
            removed_total: AtomicU64::new(0),
        }
    }

    /// Hub limits.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register an upgraded socket, queue its snapshot and start both pumps.
    pub async fn add_client(
        self: &Arc<Self>,
        socket: WebSocket,
        addr: SocketAddr,
        snapshot: &dyn SnapshotSource,
    ) -> Arc<Connection> {
        let (conn, outbound) = self.register(addr, snapshot).await;
        let (sink, stream) = socket.split();

        let _ = tokio::spawn(pumps::write_pump(
            Arc::clone(self),
            Arc::clone(&conn),
            sink,
            outbound,
        ));
        let _ = tokio::spawn(pumps::read_pump(Arc::clone(self), Arc::clone(&conn), stream));
        conn
    }

    /// Register a connection and queue its snapshot.
    ///
    /// The snapshot is taken under the write lock, so any broadcast either
    /// lands before it (and is reflected in it) or is queued after it.
    pub async fn register(
        self: &Arc<Self>,
        addr: SocketAddr,
        snapshot: &dyn SnapshotSource,
    ) -> (Arc<Connection>, mpsc::Receiver<Arc<ServerEvent>>) {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let conn = Arc::new(Connection::new(ConnectionId::new(), addr, tx));

        let overflowed = {
            let mut conns = self.connections.write().await;
            let _ = conns.insert(conn.id.clone(), Arc::clone(&conn));
            snapshot
                .snapshot()
                .into_iter()
                .any(|event| conn.send(Arc::new(event)).is_err())
        };

        info!(conn_id = %conn.id, %addr, "client connected");
        if overflowed {
            warn!(conn_id = %conn.id, "snapshot exceeds outbound queue, dropping client");
            self.schedule_removal(conn.id.clone());
        }
        (conn, rx)
    }

    /// Remove and close a connection.
    ///
    /// Idempotent: returns `false` if it was already gone.
    pub async fn remove_client(&self, id: &ConnectionId) -> bool {
        let removed = self.connections.write().await.remove(id);
        let Some(conn) = removed else {
            return false;
        };
        let _ = conn.close();
        let _ = self.removed_total.fetch_add(1, Ordering::Relaxed);
        info!(
            conn_id = %id,
            dropped = conn.drop_count(),
            age_secs = conn.age().as_secs(),
            "client disconnected"
        );
        true
    }

    /// Queue `event` for every connection. Returns the number queued.
    pub async fn broadcast(self: &Arc<Self>, event: ServerEvent) -> usize {
        let kind = event.kind();
        let event = Arc::new(event);
        let mut delivered = 0;
        let mut overflowed = Vec::new();
        {
            let conns = self.connections.read().await;
            debug!(%kind, recipients = conns.len(), "broadcast event");
            for conn in conns.values() {
                match conn.send(Arc::clone(&event)) {
                    Ok(()) => delivered += 1,
                    Err(SendError::Full) => {
                        warn!(conn_id = %conn.id, %kind, "outbound queue full, dropping client");
                        overflowed.push(conn.id.clone());
                    }
                    Err(SendError::Closed) => {
                        debug!(conn_id = %conn.id, %kind, "skipping closed connection");
                    }
                }
            }
        }
        for id in overflowed {
            self.schedule_removal(id);
        }
        delivered
    }

    /// Queue `event` for a single connection, dropping it on overflow.
    pub fn deliver(self: &Arc<Self>, conn: &Connection, event: ServerEvent) -> bool {
        match conn.send(Arc::new(event)) {
            Ok(()) => true,
            Err(SendError::Full) => {
                warn!(conn_id = %conn.id, "outbound queue full, dropping client");
                self.schedule_removal(conn.id.clone());
                false
            }
            Err(SendError::Closed) => false,
        }
    }

    /// Dispatch an inbound frame to its handler.
    pub async fn route_event(
        &self,
        frame: InboundFrame,
        from: &Connection,
    ) -> Result<Vec<ServerEvent>, RouteError> {
        self.router.route(frame, from).await
    }

    /// Close every connection.
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.connections.write().await.drain().collect();
        for (_, conn) in &drained {
            let _ = conn.close();
        }
        let _ = self
            .removed_total
            .fetch_add(drained.len() as u64, Ordering::Relaxed);
        info!(count = drained.len(), "closed all clients");
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether `id` is registered.
    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().await.contains_key(id)
    }

    /// Connections removed since startup.
    pub fn removed_total(&self) -> u64 {
        self.removed_total.load(Ordering::Relaxed)
    }

    fn schedule_removal(self: &Arc<Self>, id: ConnectionId) {
        let hub = Arc::clone(self);
        let _ = tokio::spawn(async move {
            let _ = hub.remove_client(&id).await;
        });
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default(), EventRouter::default())
    }
}
