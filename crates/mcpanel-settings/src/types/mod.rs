//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file only needs the fields it overrides.

mod process;
mod server;
mod storage;

pub use process::*;
pub use server::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "process": { "executor": "command" },
///   "logs": { "path": "/srv/minecraft/logs/latest.log" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelSettings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// Managed process control.
    pub process: ProcessSettings,
    /// Log tailing.
    pub logs: LogSettings,
    /// Mod catalog.
    pub catalog: CatalogSettings,
    /// WebSocket connections.
    pub websocket: WebSocketSettings,
    /// Diagnostic logging.
    pub logging: LoggingSettings,
}

impl PanelSettings {
    /// Reject values the panel cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("process.actionTimeoutMs", self.process.action_timeout_ms),
            ("process.probeTimeoutMs", self.process.probe_timeout_ms),
            ("process.livenessAttempts", u64::from(self.process.liveness_attempts)),
            ("process.livenessIntervalMs", self.process.liveness_interval_ms),
            ("process.reconcileIntervalSecs", self.process.reconcile_interval_secs),
            ("logs.pollIntervalMs", self.logs.poll_interval_ms),
            ("logs.flushIntervalMs", self.logs.flush_interval_ms),
            ("logs.bufferLines", self.logs.buffer_lines as u64),
            ("logs.queueCapacity", self.logs.queue_capacity as u64),
            ("catalog.scanIntervalSecs", self.catalog.scan_interval_secs),
            ("websocket.queueCapacity", self.websocket.queue_capacity as u64),
            ("websocket.pongWaitMs", self.websocket.pong_wait_ms),
            ("websocket.maxMessageSize", self.websocket.max_message_size as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(SettingsError::invalid(field, "must be greater than zero"));
            }
        }
        if self.logs.snapshot_lines > self.logs.buffer_lines {
            return Err(SettingsError::invalid(
                "logs.snapshotLines",
                format!("cannot exceed logs.bufferLines ({})", self.logs.buffer_lines),
            ));
        }
        if self.process.address.trim().is_empty() {
            return Err(SettingsError::invalid("process.address", "must not be empty"));
        }
        if self.process.control_program.trim().is_empty() {
            return Err(SettingsError::invalid(
                "process.controlProgram",
                "must not be empty",
            ));
        }
        Ok(())
    }
}
