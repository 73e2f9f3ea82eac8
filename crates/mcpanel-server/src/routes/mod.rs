//! `/api/v2` routes.

mod control;
mod logs;
mod mods;
mod sse;
mod ws;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::server::AppState;

pub use sse::SSE_HEARTBEAT;

/// Every `/api/v2` route, relative to the nest point.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(control::ping))
        .route("/ws", get(ws::upgrade))
        .route("/server/status", get(control::status))
        .route("/server/status/stream", get(sse::status_stream))
        .route("/server/start", post(control::start))
        .route("/server/stop", post(control::stop))
        .route("/server/restart", post(control::restart))
        .route("/modlist", get(mods::list))
        .route("/modlist/changelog", get(mods::changelog))
        .route("/modlist/{name}", delete(mods::remove))
        .route("/logs/latest", get(logs::latest))
}
