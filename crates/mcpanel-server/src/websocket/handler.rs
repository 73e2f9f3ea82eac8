//! Inbound frame handling: decode failures end the connection, routing
//! failures are logged and the connection stays open.

use std::sync::Arc;

use mcpanel_core::{FrameError, InboundFrame};
use tracing::{debug, instrument, warn};

use super::connection::Connection;
use super::hub::Hub;

/// What the read pump should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep reading.
    Continue,
    /// Tear the connection down.
    Disconnect,
}

/// Route a decoded frame and queue any replies for the sender.
#[instrument(skip_all, fields(conn_id = %conn.id, kind))]
pub async fn handle_frame(
    hub: &Arc<Hub>,
    conn: &Connection,
    decoded: Result<InboundFrame, FrameError>,
) -> Disposition {
    let frame = match decoded {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "undecodable frame, disconnecting client");
            return Disposition::Disconnect;
        }
    };
    let _ = tracing::Span::current().record("kind", frame.kind.as_str());

    match hub.route_event(frame, conn).await {
        Ok(replies) => {
            debug!(replies = replies.len(), "handled inbound event");
            for reply in replies {
                if !hub.deliver(conn, reply) {
                    break;
                }
            }
        }
        Err(e) => warn!(error = %e, "failed to route inbound event"),
    }
    Disposition::Continue
}
