//! Bounded in-memory window of recent log lines.

use std::collections::VecDeque;

use mcpanel_core::{LogLines, ServerEvent};
use parking_lot::Mutex;

struct Lines {
    recent: VecDeque<String>,
    /// Lines ever pushed. Positions handed to [`LogBuffer::pending`] count
    /// against this, so they survive eviction.
    total: u64,
}

/// Ring buffer of the most recent log lines.
pub struct LogBuffer {
    inner: Mutex<Lines>,
    capacity: usize,
}

impl LogBuffer {
    /// Buffer keeping at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Lines {
                recent: VecDeque::with_capacity(capacity),
                total: 0,
            }),
            capacity,
        }
    }

    /// Append a line, evicting the oldest when full. Empty lines are skipped.
    pub fn push(&self, line: String) -> bool {
        if line.is_empty() {
            return false;
        }
        let mut inner = self.inner.lock();
        if inner.recent.len() == self.capacity {
            let _ = inner.recent.pop_front();
        }
        inner.recent.push_back(line);
        inner.total += 1;
        true
    }

    /// Lines pushed after position `since`, plus the new position.
    ///
    /// Lines evicted before they were collected are lost.
    pub fn pending(&self, since: u64) -> (Vec<String>, u64) {
        let inner = self.inner.lock();
        let available = inner.total.saturating_sub(since);
        let take = usize::try_from(available)
            .unwrap_or(usize::MAX)
            .min(inner.recent.len());
        let start = inner.recent.len() - take;
        let lines = inner.recent.range(start..).cloned().collect();
        (lines, inner.total)
    }

    /// The newest `n` lines, oldest first.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let inner = self.inner.lock();
        let start = inner.recent.len().saturating_sub(n);
        inner.recent.range(start..).cloned().collect()
    }

    /// `log_snapshot` event carrying the newest `n` lines.
    pub fn snapshot_event(&self, n: usize) -> ServerEvent {
        ServerEvent::LogSnapshot(LogLines {
            lines: self.recent(n),
        })
    }

    /// Lines ever pushed.
    pub fn total(&self) -> u64 {
        self.inner.lock().total
    }

    /// Lines currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().recent.len()
    }

    /// Whether nothing has been retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum retained lines.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, lines: &[&str]) -> LogBuffer {
        let buffer = LogBuffer::new(capacity);
        for line in lines {
            let _ = buffer.push((*line).to_string());
        }
        buffer
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let buffer = filled(3, &["a", "b", "c", "d"]);
        assert_eq!(buffer.recent(10), vec!["b", "c", "d"]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.total(), 4);
    }

    #[test]
    fn empty_lines_are_skipped() {
        let buffer = LogBuffer::new(3);
        assert!(!buffer.push(String::new()));
        assert!(buffer.is_empty());
        assert_eq!(buffer.total(), 0);
    }

    #[test]
    fn recent_returns_newest_in_order() {
        let buffer = filled(5, &["a", "b", "c", "d"]);
        assert_eq!(buffer.recent(2), vec!["c", "d"]);
        assert!(buffer.recent(0).is_empty());
    }

    #[test]
    fn pending_tracks_position() {
        let buffer = filled(10, &["a", "b"]);
        let (lines, pos) = buffer.pending(0);
        assert_eq!(lines, vec!["a", "b"]);
        assert_eq!(pos, 2);

        let (lines, pos) = buffer.pending(pos);
        assert!(lines.is_empty());
        assert_eq!(pos, 2);

        let _ = buffer.push("c".into());
        assert_eq!(buffer.pending(pos), (vec!["c".to_string()], 3));
    }

    #[test]
    fn pending_is_limited_to_retained_lines() {
        let buffer = filled(2, &["a", "b", "c", "d", "e"]);
        let (lines, pos) = buffer.pending(1);
        assert_eq!(lines, vec!["d", "e"]);
        assert_eq!(pos, 5);
    }

    #[test]
    fn snapshot_event_wraps_recent_lines() {
        let buffer = filled(5, &["x", "y", "z"]);
        assert_eq!(
            buffer.snapshot_event(2),
            ServerEvent::LogSnapshot(LogLines {
                lines: vec!["y".into(), "z".into()]
            })
        );
    }
}
