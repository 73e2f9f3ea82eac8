//! Log tail pipeline: file poller, bounded queue, ring buffer and flusher.

mod buffer;
mod flusher;
mod tailer;

use std::path::PathBuf;
use std::time::Duration;

pub use buffer::LogBuffer;
pub use flusher::{LogFlusher, run_log_pipeline};
pub use tailer::{FileTailer, TailCursor, TailError, run_tailer};

/// Log pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailConfig {
    /// File to tail.
    pub path: PathBuf,
    /// How often the file is polled.
    pub poll_interval: Duration,
    /// How often new lines are broadcast.
    pub flush_interval: Duration,
    /// Ring buffer size.
    pub buffer_lines: usize,
    /// Lines sent to a new client.
    pub snapshot_lines: usize,
    /// Producer queue capacity between poller and buffer.
    pub queue_capacity: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/latest.log"),
            poll_interval: Duration::from_secs(1),
            flush_interval: Duration::from_secs(1),
            buffer_lines: 500,
            snapshot_lines: 350,
            queue_capacity: 1000,
        }
    }
}
