//! Mod catalog routes.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use mcpanel_core::{Changelog, ModList, ServerEvent};
use tracing::warn;

use crate::error::ApiError;
use crate::server::AppState;

pub(super) async fn list(State(state): State<AppState>) -> Json<ModList> {
    match state.catalog.refresh().await {
        Ok(listing) => Json(listing),
        Err(e) => {
            warn!(error = %e, "catalog refresh failed, serving cached listing");
            Json(state.catalog.cached())
        }
    }
}

pub(super) async fn changelog(State(state): State<AppState>) -> Result<Json<Changelog>, ApiError> {
    Ok(Json(state.catalog.reload_changelog().await?))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let change = state.catalog.delete(&name).await?;
    let _ = state.hub.broadcast(ServerEvent::ModDeleted(change)).await;
    let _ = state
        .hub
        .broadcast(ServerEvent::ModlistChangelog(state.catalog.cached_changelog()))
        .await;
    Ok(StatusCode::NO_CONTENT)
}
