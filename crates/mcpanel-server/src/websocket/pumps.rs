//! Per-connection read and write loops.
//!
//! Both loops end by calling [`Hub::remove_client`], which is idempotent, so
//! whichever side fails first tears the connection down and the other side
//! observes the close signal.

use std::fmt::Display;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use mcpanel_core::{InboundFrame, ServerEvent};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info, instrument, warn};

use super::connection::Connection;
use super::handler::{Disposition, handle_frame};
use super::hub::Hub;

/// Drain the outbound queue into the socket and ping on the heartbeat interval.
#[instrument(skip_all, fields(conn_id = %conn.id))]
pub(crate) async fn write_pump<S>(
    hub: Arc<Hub>,
    conn: Arc<Connection>,
    mut sink: S,
    mut outbound: mpsc::Receiver<Arc<ServerEvent>>,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = hub.config().heartbeat.ping_ticker();

    loop {
        tokio::select! {
            biased;
            () = conn.closed() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            next = outbound.recv() => {
                let Some(event) = next else { break };
                let text = match event.to_wire() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(kind = %event.kind(), error = %e, "failed to serialize event");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    debug!(error = %e, "socket write failed");
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    debug!(error = %e, "ping write failed");
                    break;
                }
            }
        }
    }

    let _ = hub.remove_client(&conn.id).await;
}

/// Decode inbound frames until the socket fails or the pong deadline passes.
#[instrument(skip_all, fields(conn_id = %conn.id))]
pub(crate) async fn read_pump<St, E>(hub: Arc<Hub>, conn: Arc<Connection>, mut stream: St)
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let heartbeat = hub.config().heartbeat;

    loop {
        let deadline = heartbeat.read_deadline(&conn);
        let next = tokio::select! {
            biased;
            () = conn.closed() => break,
            next = time::timeout_at(deadline, stream.next()) => next,
        };
        let message = match next {
            Err(_) => {
                info!(pong_wait_ms = heartbeat.pong_wait.as_millis(), "no pong before deadline");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!(error = %e, "socket read failed");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        let decoded = match message {
            Message::Text(text) => InboundFrame::decode(text.as_str()),
            Message::Binary(bytes) => InboundFrame::decode_bytes(&bytes),
            Message::Pong(_) => {
                conn.mark_alive();
                continue;
            }
            Message::Ping(_) => continue,
            Message::Close(_) => break,
        };
        if handle_frame(&hub, &conn, decoded).await == Disposition::Disconnect {
            break;
        }
    }

    let _ = hub.remove_client(&conn.id).await;
}
