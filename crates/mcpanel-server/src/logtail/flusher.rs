//! Consumer side of the log pipeline.

use std::sync::Arc;
use std::time::Duration;

use mcpanel_core::{LogLines, ServerEvent};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::buffer::LogBuffer;
use crate::websocket::Hub;

/// Tracks the single shared "last broadcast" position into a [`LogBuffer`].
pub struct LogFlusher {
    buffer: Arc<LogBuffer>,
    cursor: u64,
}

impl LogFlusher {
    /// Start after everything the buffer already holds.
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        let cursor = buffer.total();
        Self { buffer, cursor }
    }

    /// Position of the last flushed line.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Batch every line pushed since the last call into one `log_append`.
    pub fn take_pending(&mut self) -> Option<ServerEvent> {
        let (lines, next) = self.buffer.pending(self.cursor);
        self.cursor = next;
        if lines.is_empty() {
            return None;
        }
        Some(ServerEvent::LogAppend(LogLines { lines }))
    }
}

/// Append queued lines to `buffer` and broadcast new ones every `period`.
pub async fn run_log_pipeline(
    mut lines: mpsc::Receiver<String>,
    buffer: Arc<LogBuffer>,
    hub: Arc<Hub>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut flusher = LogFlusher::new(buffer);
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            next = lines.recv() => match next {
                Some(line) => {
                    let _ = flusher.buffer.push(line);
                }
                None => break,
            },
            _ = ticker.tick() => {
                if let Some(event) = flusher.take_pending() {
                    let reached = hub.broadcast(event).await;
                    debug!(clients = reached, cursor = flusher.cursor(), "log lines flushed");
                }
            }
        }
    }
    info!("log pipeline stopped");
}
