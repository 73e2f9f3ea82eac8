//! Managed process lifecycle status and the actions that move it.
//!
//! The guard table lives here so every caller (HTTP, tests, tooling) applies
//! the same rule:
//!
//! | Current | start | stop | restart |
//! |---|---|---|---|
//! | `offline` | yes | no | yes |
//! | `online` | no | yes | yes |
//! | transitional | no | no | no |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of the managed process. Exactly one value is live at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Not running.
    Offline,
    /// Start action in flight.
    Starting,
    /// Running and reachable.
    Online,
    /// Stop action in flight.
    Stopping,
    /// Restart action in flight.
    Restarting,
}

impl ServerStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Offline,
        Self::Starting,
        Self::Online,
        Self::Stopping,
        Self::Restarting,
    ];

    /// Wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Starting => "starting",
            Self::Online => "online",
            Self::Stopping => "stopping",
            Self::Restarting => "restarting",
        }
    }

    /// Whether this status must still resolve to `Online` or `Offline`.
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping | Self::Restarting)
    }

    /// Stable status implied by a reachability observation.
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable { Self::Online } else { Self::Offline }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown server status: {s}"))
    }
}

/// A lifecycle action a client may request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerAction {
    /// Bring the process up.
    Start,
    /// Bring the process down.
    Stop,
    /// Stop then start.
    Restart,
}

impl ServerAction {
    /// Every action, in declaration order.
    pub const ALL: [Self; 3] = [Self::Start, Self::Stop, Self::Restart];

    /// Name passed to the external control command.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }

    /// Guard table: may this action run while the process is in `current`?
    pub fn permitted_from(self, current: ServerStatus) -> bool {
        match self {
            Self::Start => current == ServerStatus::Offline,
            Self::Stop => current == ServerStatus::Online,
            Self::Restart => !current.is_transitional(),
        }
    }

    /// Status published while the action is in flight.
    pub fn transitional_status(self) -> ServerStatus {
        match self {
            Self::Start => ServerStatus::Starting,
            Self::Stop => ServerStatus::Stopping,
            Self::Restart => ServerStatus::Restarting,
        }
    }

    /// Status published when the action completes and is confirmed.
    pub fn target_status(self) -> ServerStatus {
        match self {
            Self::Start | Self::Restart => ServerStatus::Online,
            Self::Stop => ServerStatus::Offline,
        }
    }

    /// Reachability that confirms completion.
    pub fn expects_reachable(self) -> bool {
        self.target_status() == ServerStatus::Online
    }
}

impl fmt::Display for ServerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown server action: {s}"))
    }
}

/// Returned when the guard table rejects an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} while server is {current}")]
pub struct ActionRejected {
    /// The requested action.
    pub action: ServerAction,
    /// Status at the time of the request.
    pub current: ServerStatus,
}
