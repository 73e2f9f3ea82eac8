//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mcpanel_core::{ActionRejected, ServerStatus};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::catalog::CatalogError;

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The guard table rejected a control request.
    #[error(transparent)]
    Conflict(#[from] ActionRejected),
    /// A path parameter was unusable.
    #[error("{0}")]
    BadRequest(String),
    /// The named resource does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::InvalidName(_) => Self::BadRequest(e.to_string()),
            CatalogError::NotFound(_) => Self::NotFound(e.to_string()),
            CatalogError::Io(_) | CatalogError::Json(_) => Self::Internal(e.to_string()),
        }
    }
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn current_status(&self) -> Option<ServerStatus> {
        match self {
            Self::Conflict(rejected) => Some(rejected.current),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        if code.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = match self.current_status() {
            Some(status) => json!({ "error": self.to_string(), "status": status }),
            None => json!({ "error": self.to_string() }),
        };
        (code, Json(body)).into_response()
    }
}
