//! Inbound event routing.
//!
//! Handlers are keyed by [`EventKind`]. A frame whose type is not a known
//! kind, or is a kind with no handler, yields [`RouteError::UnknownEventType`];
//! the caller logs it and keeps the connection open.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mcpanel_core::{EventKind, InboundFrame, ServerEvent};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::connection::Connection;

/// Failure to route an inbound frame.
#[derive(Debug, Error)]
pub enum RouteError {
    /// No handler is registered for this type.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
    /// The payload does not fit the event type.
    #[error("invalid payload for {kind}: {reason}")]
    InvalidPayload {
        /// Event type.
        kind: EventKind,
        /// What was wrong.
        reason: String,
    },
    /// The handler ran and failed.
    #[error("{kind} handler failed: {reason}")]
    Handler {
        /// Event type.
        kind: EventKind,
        /// Failure description.
        reason: String,
    },
}

/// Handles one inbound event kind.
///
/// Returned events are delivered to the sending connection only.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle a frame from `from`.
    async fn handle(&self, payload: Value, from: &Connection)
    -> Result<Vec<ServerEvent>, RouteError>;
}

/// Kind-keyed handler table.
pub struct EventRouter {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl EventRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one for `kind`.
    pub fn register(&mut self, kind: EventKind, handler: impl EventHandler + 'static) {
        let _ = self.handlers.insert(kind, Arc::new(handler));
    }

    /// Whether `kind` has a handler.
    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered kinds, sorted by wire name.
    pub fn kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    /// Dispatch `frame` to its handler.
    pub async fn route(
        &self,
        frame: InboundFrame,
        from: &Connection,
    ) -> Result<Vec<ServerEvent>, RouteError> {
        let handler = frame
            .kind
            .parse::<EventKind>()
            .ok()
            .and_then(|kind| self.handlers.get(&kind))
            .ok_or_else(|| RouteError::UnknownEventType(frame.kind.clone()))?;
        debug!(kind = %frame.kind, conn_id = %from.id, "routing inbound event");
        handler.handle(frame.payload, from).await
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept an absent or empty-object payload; reject anything else.
pub fn expect_empty_payload(kind: EventKind, payload: &Value) -> Result<(), RouteError> {
    match payload {
        Value::Null => Ok(()),
        Value::Object(map) if map.is_empty() => Ok(()),
        other => Err(RouteError::InvalidPayload {
            kind,
            reason: format!("expected no payload, got {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use assert_matches::assert_matches;
    use mcpanel_core::{ConnectionId, ServerStatus};
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    struct EchoStatus;

    #[async_trait]
    impl EventHandler for EchoStatus {
        async fn handle(
            &self,
            payload: Value,
            _from: &Connection,
        ) -> Result<Vec<ServerEvent>, RouteError> {
            expect_empty_payload(EventKind::StatusUpdate, &payload)?;
            Ok(vec![ServerEvent::status(ServerStatus::Online)])
        }
    }

    fn connection() -> Connection {
        let (tx, _rx) = mpsc::channel(1);
        Connection::new(
            ConnectionId::from("conn_r"),
            SocketAddr::from(([127, 0, 0, 1], 2)),
            tx,
        )
    }

    fn frame(kind: &str, payload: Value) -> InboundFrame {
        InboundFrame {
            kind: kind.into(),
            payload,
        }
    }

    fn router() -> EventRouter {
        let mut router = EventRouter::new();
        router.register(EventKind::StatusUpdate, EchoStatus);
        router
    }

    #[tokio::test]
    async fn routes_to_registered_handler() {
        let replies = router()
            .route(frame("status_update", Value::Null), &connection())
            .await
            .unwrap();
        assert_eq!(replies, vec![ServerEvent::status(ServerStatus::Online)]);
    }

    #[tokio::test]
    async fn unknown_type_is_routing_error() {
        let err = router()
            .route(frame("chat_message", Value::Null), &connection())
            .await
            .unwrap_err();
        assert_matches!(err, RouteError::UnknownEventType(ref kind) if kind == "chat_message");
    }

    #[tokio::test]
    async fn known_kind_without_handler_is_unknown() {
        let err = router()
            .route(frame("log_append", Value::Null), &connection())
            .await
            .unwrap_err();
        assert_matches!(err, RouteError::UnknownEventType(_));
    }

    #[tokio::test]
    async fn payload_errors_surface() {
        let err = router()
            .route(frame("status_update", json!([1])), &connection())
            .await
            .unwrap_err();
        assert_matches!(
            err,
            RouteError::InvalidPayload {
                kind: EventKind::StatusUpdate,
                ..
            }
        );
    }

    #[test]
    fn register_and_list() {
        let mut router = router();
        router.register(EventKind::LogSnapshot, EchoStatus);
        assert!(router.has_handler(EventKind::LogSnapshot));
        assert!(!router.has_handler(EventKind::ModAdded));
        assert_eq!(
            router.kinds(),
            vec![EventKind::LogSnapshot, EventKind::StatusUpdate]
        );
    }

    #[test]
    fn empty_payload_rules() {
        assert!(expect_empty_payload(EventKind::LogSnapshot, &Value::Null).is_ok());
        assert!(expect_empty_payload(EventKind::LogSnapshot, &json!({})).is_ok());
        assert!(expect_empty_payload(EventKind::LogSnapshot, &json!({"a": 1})).is_err());
    }
}
