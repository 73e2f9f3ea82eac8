//! WebSocket client connection state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use mcpanel_core::{ConnectionId, ServerEvent};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why an event could not be queued for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The outbound queue is at capacity.
    #[error("outbound queue full")]
    Full,
    /// The connection is closing or its write pump is gone.
    #[error("connection closed")]
    Closed,
}

/// One connected client: identity, outbound queue, and liveness state.
///
/// The queue is drained only by this connection's write pump.
pub struct Connection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Remote address.
    pub addr: SocketAddr,
    tx: mpsc::Sender<Arc<ServerEvent>>,
    /// When this connection was established.
    pub connected_at: Instant,
    last_pong: Mutex<Instant>,
    closing: AtomicBool,
    closed: CancellationToken,
    dropped_messages: AtomicU64,
}

impl Connection {
    /// Create a connection writing into `tx`.
    pub fn new(id: ConnectionId, addr: SocketAddr, tx: mpsc::Sender<Arc<ServerEvent>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            addr,
            tx,
            connected_at: now,
            last_pong: Mutex::new(now),
            closing: AtomicBool::new(false),
            closed: CancellationToken::new(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue an event without waiting.
    pub fn send(&self, event: Arc<ServerEvent>) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(SendError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Events refused because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record a pong from the client.
    pub fn mark_alive(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    /// Instant of the last pong (or connection establishment).
    pub fn last_pong(&self) -> Instant {
        *self.last_pong.lock()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Signal both pumps to stop.
    ///
    /// Returns `true` only for the call that actually closed the connection.
    pub fn close(&self) -> bool {
        if self.closing.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.closed.cancel();
        true
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}
