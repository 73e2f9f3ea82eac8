//! Status reads and lifecycle actions.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use mcpanel_core::{ServerAction, ServerStatus, StatusPayload};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::server::AppState;

/// Body of an accepted action.
#[derive(Debug, Serialize)]
pub struct Accepted {
    message: String,
    status: ServerStatus,
}

pub(super) async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

pub(super) async fn status(State(state): State<AppState>) -> Json<StatusPayload> {
    Json(StatusPayload {
        status: state.machine.status(),
    })
}

pub(super) async fn start(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    dispatch(&state, ServerAction::Start)
}

pub(super) async fn stop(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    dispatch(&state, ServerAction::Stop)
}

pub(super) async fn restart(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    dispatch(&state, ServerAction::Restart)
}

/// Validate and launch `action`; the response does not wait for it.
fn dispatch(
    state: &AppState,
    action: ServerAction,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    let handle = state.machine.request(action)?;
    let _ = tokio::spawn(async move {
        let outcome = handle.wait().await;
        match &outcome.result {
            Ok(()) => info!(%action, status = %outcome.status, "action completed"),
            Err(error) => warn!(%action, status = %outcome.status, %error, "action failed"),
        }
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(Accepted {
            message: format!("{action} requested"),
            status: action.transitional_status(),
        }),
    ))
}
