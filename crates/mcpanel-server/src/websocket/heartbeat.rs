//! Ping/pong keepalive timing.
//!
//! The write pump pings every `ping_interval`; the read pump drops the
//! connection if no pong arrives within `pong_wait` of the previous one.
//! The ping interval is kept below the pong wait so a healthy client always
//! answers before its deadline.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::connection::Connection;

/// Keepalive timing for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Time between pings.
    pub ping_interval: Duration,
    /// Time allowed between pongs.
    pub pong_wait: Duration,
}

impl Heartbeat {
    /// Derive the ping interval as 90% of `pong_wait`.
    pub fn from_pong_wait(pong_wait: Duration) -> Self {
        let ping_interval = (pong_wait * 9 / 10).max(Duration::from_millis(1));
        Self {
            ping_interval,
            pong_wait,
        }
    }

    /// Instant after which the read pump gives up on `connection`.
    pub fn read_deadline(&self, connection: &Connection) -> Instant {
        connection.last_pong() + self.pong_wait
    }

    /// Ping ticker whose first tick fires one interval from now.
    pub fn ping_ticker(&self) -> Interval {
        let mut ticker = time::interval_at(Instant::now() + self.ping_interval, self.ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::from_pong_wait(Duration::from_secs(10))
    }
}
