//! Fan-out of status changes beyond the WebSocket hub.

use std::sync::Arc;

use mcpanel_core::{ServerEvent, ServerStatus};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::machine::StatusUpdates;
use crate::websocket::Hub;

/// Broadcast channel feeding the server-sent status stream.
#[derive(Clone)]
pub struct StatusFeed {
    tx: broadcast::Sender<ServerStatus>,
}

impl StatusFeed {
    /// Create a feed that buffers up to `capacity` changes per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to future changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerStatus> {
        self.tx.subscribe()
    }

    /// Publish a change. Returns the number of subscribers reached.
    pub fn publish(&self, status: ServerStatus) -> usize {
        self.tx.send(status).unwrap_or(0)
    }

    /// Current subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StatusFeed {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Drain the machine's handoff channel in order, broadcasting every change to
/// the hub and the feed.
pub async fn run_status_forwarder(
    mut updates: StatusUpdates,
    hub: Arc<Hub>,
    feed: StatusFeed,
    cancel: CancellationToken,
) {
    loop {
        let status = tokio::select! {
            () = cancel.cancelled() => break,
            next = updates.recv() => match next {
                Some(status) => status,
                None => break,
            },
        };
        let reached = hub.broadcast(ServerEvent::status(status)).await;
        let _ = feed.publish(status);
        debug!(%status, clients = reached, "status change forwarded");
    }
    info!("status forwarder stopped");
}
