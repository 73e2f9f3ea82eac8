//! Inbound handlers that let a client re-request one slice of its snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use mcpanel_core::{EventKind, ServerEvent};
use serde_json::Value;

use super::connection::Connection;
use super::router::{EventHandler, EventRouter, RouteError, expect_empty_payload};
use crate::catalog::Catalog;
use crate::logtail::LogBuffer;
use crate::status::StatusMachine;

/// `status_update` → current status.
pub struct StatusResync {
    machine: Arc<StatusMachine>,
}

#[async_trait]
impl EventHandler for StatusResync {
    async fn handle(
        &self,
        payload: Value,
        _from: &Connection,
    ) -> Result<Vec<ServerEvent>, RouteError> {
        expect_empty_payload(EventKind::StatusUpdate, &payload)?;
        Ok(vec![ServerEvent::status(self.machine.status())])
    }
}

/// `log_snapshot` → recent log lines.
pub struct LogResync {
    buffer: Arc<LogBuffer>,
    lines: usize,
}

#[async_trait]
impl EventHandler for LogResync {
    async fn handle(
        &self,
        payload: Value,
        _from: &Connection,
    ) -> Result<Vec<ServerEvent>, RouteError> {
        expect_empty_payload(EventKind::LogSnapshot, &payload)?;
        Ok(vec![self.buffer.snapshot_event(self.lines)])
    }
}

/// `modlist_update` → freshly listed catalog.
pub struct CatalogResync {
    catalog: Arc<Catalog>,
}

#[async_trait]
impl EventHandler for CatalogResync {
    async fn handle(
        &self,
        payload: Value,
        _from: &Connection,
    ) -> Result<Vec<ServerEvent>, RouteError> {
        expect_empty_payload(EventKind::ModlistUpdate, &payload)?;
        let listing = self
            .catalog
            .refresh()
            .await
            .map_err(|e| RouteError::Handler {
                kind: EventKind::ModlistUpdate,
                reason: e.to_string(),
            })?;
        Ok(vec![ServerEvent::ModlistUpdate(listing)])
    }
}

/// `modlist_changelog` → changelog read from disk.
pub struct ChangelogResync {
    catalog: Arc<Catalog>,
}

#[async_trait]
impl EventHandler for ChangelogResync {
    async fn handle(
        &self,
        payload: Value,
        _from: &Connection,
    ) -> Result<Vec<ServerEvent>, RouteError> {
        expect_empty_payload(EventKind::ModlistChangelog, &payload)?;
        let changes = self
            .catalog
            .reload_changelog()
            .await
            .map_err(|e| RouteError::Handler {
                kind: EventKind::ModlistChangelog,
                reason: e.to_string(),
            })?;
        Ok(vec![ServerEvent::ModlistChangelog(changes)])
    }
}

/// Router with every resync handler registered.
pub fn default_router(
    machine: Arc<StatusMachine>,
    buffer: Arc<LogBuffer>,
    catalog: Arc<Catalog>,
    snapshot_lines: usize,
) -> EventRouter {
    let mut router = EventRouter::new();
    router.register(EventKind::StatusUpdate, StatusResync { machine });
    router.register(
        EventKind::LogSnapshot,
        LogResync {
            buffer,
            lines: snapshot_lines,
        },
    );
    router.register(
        EventKind::ModlistUpdate,
        CatalogResync {
            catalog: Arc::clone(&catalog),
        },
    );
    router.register(EventKind::ModlistChangelog, ChangelogResync { catalog });
    router
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use mcpanel_core::{ConnectionId, InboundFrame, LogLines, ServerStatus};
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    use super::*;
    use crate::catalog::CatalogConfig;
    use crate::status::{SimulatedProcess, StatusConfig};

    struct Fixture {
        _dir: TempDir,
        router: EventRouter,
        conn: Connection,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("mods")).unwrap();
        std::fs::write(dir.path().join("mods/a.jar"), b"a").unwrap();

        let process = Arc::new(SimulatedProcess::new(Duration::ZERO, true));
        let (machine, _updates) = StatusMachine::new(
            ServerStatus::Online,
            process.clone(),
            process,
            StatusConfig::default(),
        );
        let buffer = Arc::new(LogBuffer::new(10));
        for line in ["one", "two", "three"] {
            let _ = buffer.push(line.into());
        }
        let catalog = Arc::new(Catalog::new(&CatalogConfig {
            mods_dir: dir.path().join("mods"),
            changelog_dir: dir.path().join("changelog"),
            scan_interval: Duration::from_secs(10),
        }));
        let router = default_router(Arc::new(machine), buffer, catalog, 2);
        let (tx, _rx) = mpsc::channel(1);
        let conn = Connection::new(
            ConnectionId::new(),
            SocketAddr::from(([127, 0, 0, 1], 7)),
            tx,
        );
        Fixture {
            _dir: dir,
            router,
            conn,
        }
    }

    async fn send(f: &Fixture, kind: &str, payload: Value) -> Result<Vec<ServerEvent>, RouteError> {
        let frame = InboundFrame {
            kind: kind.into(),
            payload,
        };
        f.router.route(frame, &f.conn).await
    }

    #[test]
    fn registers_the_four_resync_kinds() {
        let f = fixture();
        assert_eq!(
            f.router.kinds(),
            vec![
                EventKind::LogSnapshot,
                EventKind::ModlistChangelog,
                EventKind::ModlistUpdate,
                EventKind::StatusUpdate,
            ]
        );
    }

    #[tokio::test]
    async fn status_resync_returns_current_status() {
        let f = fixture();
        let replies = send(&f, "status_update", Value::Null).await.unwrap();
        assert_eq!(replies, vec![ServerEvent::status(ServerStatus::Online)]);
    }

    #[tokio::test]
    async fn log_resync_returns_recent_lines() {
        let f = fixture();
        let replies = send(&f, "log_snapshot", json!({})).await.unwrap();
        assert_eq!(
            replies,
            vec![ServerEvent::LogSnapshot(LogLines {
                lines: vec!["two".into(), "three".into()]
            })]
        );
    }

    #[tokio::test]
    async fn catalog_resync_lists_directory() {
        let f = fixture();
        let replies = send(&f, "modlist_update", Value::Null).await.unwrap();
        let [ServerEvent::ModlistUpdate(list)] = replies.as_slice() else {
            panic!("unexpected replies: {replies:?}");
        };
        assert_eq!(list.mods.len(), 1);
        assert_eq!(list.mods[0].name, "a.jar");
    }

    #[tokio::test]
    async fn changelog_resync_reads_empty_log() {
        let f = fixture();
        let replies = send(&f, "modlist_changelog", Value::Null).await.unwrap();
        assert_eq!(replies, vec![ServerEvent::ModlistChangelog(Default::default())]);
    }

    #[tokio::test]
    async fn payloads_are_rejected_and_outbound_only_kinds_unknown() {
        let f = fixture();
        assert_matches!(
            send(&f, "status_update", json!({"status": "online"})).await,
            Err(RouteError::InvalidPayload {
                kind: EventKind::StatusUpdate,
                ..
            })
        );
        assert_matches!(
            send(&f, "log_append", Value::Null).await,
            Err(RouteError::UnknownEventType(kind)) if kind == "log_append"
        );
    }
}
