//! Server-sent status stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use mcpanel_core::ServerStatus;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::server::AppState;

/// Interval of the `:heartbeat` comment frames.
pub const SSE_HEARTBEAT: Duration = Duration::from_secs(15);

fn status_event(status: ServerStatus) -> Event {
    Event::default().data(json!({ "status": status }).to_string())
}

pub(super) async fn status_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before reading the current value so no change is missed.
    let mut changes = state.feed.subscribe();
    let current = state.machine.status();
    let machine = state.machine;

    let stream = async_stream::stream! {
        yield Ok(status_event(current));
        loop {
            match changes.recv().await {
                Ok(status) => yield Ok(status_event(status)),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "status stream lagged, resending current status");
                    yield Ok(status_event(machine.status()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(SSE_HEARTBEAT).text("heartbeat"))
}
