use axum::Json;
use axum::extract::State;
use mcpanel_core::LogLines;

use crate::server::AppState;

pub(super) async fn latest(State(state): State<AppState>) -> Json<LogLines> {
    Json(LogLines {
        lines: state.logs.recent(state.snapshot_lines),
    })
}
