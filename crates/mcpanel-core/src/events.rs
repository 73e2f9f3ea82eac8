//! Wire events.
//!
//! Every frame in either direction is `{"type": <kind>, "payload": <json>}`.
//! Outbound frames are the closed [`ServerEvent`] union; inbound frames are
//! decoded into an [`InboundFrame`] and dispatched by kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::{Changelog, ModChange, ModList};
use crate::status::ServerStatus;

/// Payload of `status_update`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Current status.
    pub status: ServerStatus,
}

/// Payload of `log_append` and `log_snapshot`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLines {
    /// Log lines, oldest first.
    pub lines: Vec<String>,
}

/// Event pushed from the server to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Lifecycle status changed.
    StatusUpdate(StatusPayload),
    /// Full catalog listing.
    ModlistUpdate(ModList),
    /// A mod appeared.
    ModAdded(ModChange),
    /// A mod was removed.
    ModDeleted(ModChange),
    /// A mod changed on disk.
    ModUpdated(ModChange),
    /// New log lines since the last flush.
    LogAppend(LogLines),
    /// Recent log lines sent on connect.
    LogSnapshot(LogLines),
    /// Full changelog.
    ModlistChangelog(Changelog),
}

impl ServerEvent {
    /// Shorthand for a `status_update` event.
    pub fn status(status: ServerStatus) -> Self {
        Self::StatusUpdate(StatusPayload { status })
    }

    /// Kind tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StatusUpdate(_) => EventKind::StatusUpdate,
            Self::ModlistUpdate(_) => EventKind::ModlistUpdate,
            Self::ModAdded(_) => EventKind::ModAdded,
            Self::ModDeleted(_) => EventKind::ModDeleted,
            Self::ModUpdated(_) => EventKind::ModUpdated,
            Self::LogAppend(_) => EventKind::LogAppend,
            Self::LogSnapshot(_) => EventKind::LogSnapshot,
            Self::ModlistChangelog(_) => EventKind::ModlistChangelog,
        }
    }

    /// Serialize to the JSON wire frame.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Tag of a wire event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// `status_update`
    StatusUpdate,
    /// `modlist_update`
    ModlistUpdate,
    /// `mod_added`
    ModAdded,
    /// `mod_deleted`
    ModDeleted,
    /// `mod_updated`
    ModUpdated,
    /// `log_append`
    LogAppend,
    /// `log_snapshot`
    LogSnapshot,
    /// `modlist_changelog`
    ModlistChangelog,
}

impl EventKind {
    /// Every kind.
    pub const ALL: [Self; 8] = [
        Self::StatusUpdate,
        Self::ModlistUpdate,
        Self::ModAdded,
        Self::ModDeleted,
        Self::ModUpdated,
        Self::LogAppend,
        Self::LogSnapshot,
        Self::ModlistChangelog,
    ];

    /// Wire tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatusUpdate => "status_update",
            Self::ModlistUpdate => "modlist_update",
            Self::ModAdded => "mod_added",
            Self::ModDeleted => "mod_deleted",
            Self::ModUpdated => "mod_updated",
            Self::LogAppend => "log_append",
            Self::LogSnapshot => "log_snapshot",
            Self::ModlistChangelog => "modlist_changelog",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_owned())
    }
}

/// Failure to decode an inbound frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Not a JSON object with a string `type`.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A decoded inbound frame. The kind is kept as a string so unknown kinds
/// reach the router and are reported there instead of failing the decode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Event type tag as sent by the client.
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload, `null` when absent.
    #[serde(default)]
    pub payload: Value,
}

impl InboundFrame {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode a binary frame.
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ModChangeType, ModEntry};
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn status_update_wire_shape() {
        let event = ServerEvent::status(ServerStatus::Online);
        let value: Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "status_update", "payload": {"status": "online"}})
        );
    }

    #[test]
    fn log_append_wire_shape() {
        let event = ServerEvent::LogAppend(LogLines {
            lines: vec!["a".into(), "b".into()],
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "log_append");
        assert_eq!(value["payload"]["lines"], json!(["a", "b"]));
    }

    #[test]
    fn modlist_update_wire_shape() {
        let event = ServerEvent::ModlistUpdate(ModList {
            mods: vec![ModEntry {
                name: "a.jar".into(),
                size: 1,
                mod_time: 2,
            }],
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "modlist_update");
        assert_eq!(value["payload"]["mods"][0]["modTime"], 2);
    }

    #[test]
    fn changelog_wire_shape() {
        let event = ServerEvent::ModlistChangelog(Changelog {
            changes: vec![ModChange {
                time: "t".into(),
                kind: ModChangeType::Added,
                name: "a.jar".into(),
            }],
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "modlist_changelog");
        assert_eq!(value["payload"]["changes"][0]["type"], "added");
    }

    #[test]
    fn kind_matches_serialized_tag() {
        let events = [
            ServerEvent::status(ServerStatus::Offline),
            ServerEvent::ModlistUpdate(ModList::default()),
            ServerEvent::ModAdded(ModChange::now(ModChangeType::Added, "a.jar")),
            ServerEvent::ModDeleted(ModChange::now(ModChangeType::Deleted, "a.jar")),
            ServerEvent::ModUpdated(ModChange::now(ModChangeType::Updated, "a.jar")),
            ServerEvent::LogAppend(LogLines::default()),
            ServerEvent::LogSnapshot(LogLines::default()),
            ServerEvent::ModlistChangelog(Changelog::default()),
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.kind().as_str());
        }
    }

    #[test]
    fn event_deserializes_from_wire() {
        let text = r#"{"type":"status_update","payload":{"status":"stopping"}}"#;
        let event: ServerEvent = serde_json::from_str(text).unwrap();
        assert_eq!(event, ServerEvent::status(ServerStatus::Stopping));
    }

    #[test]
    fn kind_from_str() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert_eq!("ping".parse::<EventKind>().unwrap_err(), "ping");
    }

    #[test]
    fn inbound_frame_without_payload() {
        let frame = InboundFrame::decode(r#"{"type":"log_snapshot"}"#).unwrap();
        assert_eq!(frame.kind, "log_snapshot");
        assert!(frame.payload.is_null());
    }

    #[test]
    fn inbound_frame_keeps_unknown_kind() {
        let frame = InboundFrame::decode(r#"{"type":"chat","payload":{"text":"hi"}}"#).unwrap();
        assert_eq!(frame.kind, "chat");
        assert_eq!(frame.payload["text"], "hi");
    }

    #[test]
    fn inbound_frame_rejects_garbage() {
        assert_matches!(InboundFrame::decode("not json"), Err(FrameError::Malformed(_)));
        assert_matches!(InboundFrame::decode(r#"{"payload":1}"#), Err(FrameError::Malformed(_)));
        assert_matches!(InboundFrame::decode_bytes(b"[1,2]"), Err(FrameError::Malformed(_)));
    }
}
