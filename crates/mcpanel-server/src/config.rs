//! Runtime configuration of the panel server.

use std::path::PathBuf;
use std::time::Duration;

use mcpanel_settings::PanelSettings;

use crate::catalog::CatalogConfig;
use crate::logtail::TailConfig;
use crate::status::StatusConfig;
use crate::websocket::{Heartbeat, HubConfig};

/// Everything [`PanelServer`](crate::server::PanelServer) needs besides its
/// executor and probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` auto-assigns).
    pub port: u16,
    /// CORS origins. Empty allows any origin.
    pub allowed_origins: Vec<String>,
    /// Connection limits.
    pub hub: HubConfig,
    /// Action timing.
    pub status: StatusConfig,
    /// Interval of the drift reconciler.
    pub reconcile_interval: Duration,
    /// Log pipeline.
    pub logs: TailConfig,
    /// Mod catalog.
    pub catalog: CatalogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            allowed_origins: Vec::new(),
            hub: HubConfig::default(),
            status: StatusConfig::default(),
            reconcile_interval: Duration::from_secs(30),
            logs: TailConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl From<&PanelSettings> for ServerConfig {
    fn from(s: &PanelSettings) -> Self {
        Self {
            host: s.server.host.clone(),
            port: s.server.port,
            allowed_origins: s.server.allowed_origins.clone(),
            hub: HubConfig {
                queue_capacity: s.websocket.queue_capacity,
                heartbeat: Heartbeat::from_pong_wait(Duration::from_millis(
                    s.websocket.pong_wait_ms,
                )),
                max_message_size: s.websocket.max_message_size,
            },
            status: StatusConfig {
                action_timeout: Duration::from_millis(s.process.action_timeout_ms),
                liveness_attempts: s.process.liveness_attempts,
                liveness_interval: Duration::from_millis(s.process.liveness_interval_ms),
            },
            reconcile_interval: Duration::from_secs(s.process.reconcile_interval_secs),
            logs: TailConfig {
                path: PathBuf::from(&s.logs.path),
                poll_interval: Duration::from_millis(s.logs.poll_interval_ms),
                flush_interval: Duration::from_millis(s.logs.flush_interval_ms),
                buffer_lines: s.logs.buffer_lines,
                snapshot_lines: s.logs.snapshot_lines,
                queue_capacity: s.logs.queue_capacity,
            },
            catalog: CatalogConfig {
                mods_dir: PathBuf::from(&s.catalog.mods_dir),
                changelog_dir: PathBuf::from(&s.catalog.changelog_dir),
                scan_interval: Duration::from_secs(s.catalog.scan_interval_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_any_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn default_settings_map_to_default_limits() {
        let cfg = ServerConfig::from(&PanelSettings::default());
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.hub, HubConfig::default());
        assert_eq!(cfg.status, StatusConfig::default());
        assert_eq!(cfg.reconcile_interval, Duration::from_secs(30));
        assert_eq!(cfg.logs, TailConfig::default());
        assert_eq!(cfg.catalog, CatalogConfig::default());
    }

    #[test]
    fn pong_wait_drives_ping_interval() {
        let mut settings = PanelSettings::default();
        settings.websocket.pong_wait_ms = 20_000;
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.hub.heartbeat.pong_wait, Duration::from_secs(20));
        assert_eq!(cfg.hub.heartbeat.ping_interval, Duration::from_secs(18));
    }
}
