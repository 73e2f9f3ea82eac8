//! State burst queued for every new connection.

use std::sync::Arc;

use mcpanel_core::ServerEvent;

use crate::catalog::Catalog;
use crate::logtail::LogBuffer;
use crate::status::StatusMachine;

/// Produces the events a newly registered connection receives first.
///
/// Called while the hub's write lock is held, so implementations must only
/// read in-memory state.
pub trait SnapshotSource: Send + Sync {
    /// Current state as an ordered list of events.
    fn snapshot(&self) -> Vec<ServerEvent>;
}

impl SnapshotSource for Vec<ServerEvent> {
    fn snapshot(&self) -> Vec<ServerEvent> {
        self.clone()
    }
}

/// Status, recent log lines, catalog and changelog.
pub struct PanelSnapshot {
    status: Arc<StatusMachine>,
    logs: Arc<LogBuffer>,
    catalog: Arc<Catalog>,
    log_lines: usize,
}

impl PanelSnapshot {
    /// Snapshot sending up to `log_lines` recent lines.
    pub fn new(
        status: Arc<StatusMachine>,
        logs: Arc<LogBuffer>,
        catalog: Arc<Catalog>,
        log_lines: usize,
    ) -> Self {
        Self {
            status,
            logs,
            catalog,
            log_lines,
        }
    }
}

impl SnapshotSource for PanelSnapshot {
    fn snapshot(&self) -> Vec<ServerEvent> {
        vec![
            ServerEvent::status(self.status.status()),
            self.logs.snapshot_event(self.log_lines),
            ServerEvent::ModlistUpdate(self.catalog.cached()),
            ServerEvent::ModlistChangelog(self.catalog.cached_changelog()),
        ]
    }
}
