//! # API Error Types
//!
//! Error types for the HTTP surface, with the mapping to response codes.
//!
//! ## Status Mapping
//! ```text
//! MissingToken      → 400   (device forgot the token field)
//! BadRequest        → 400   (malformed payload, dose mismatch)
//! InvalidToken      → 401
//! Forbidden         → 403   (order not owned by the calling device)
//! NotFound          → 404
//! Throttled         → 429
//! Internal          → 500
//! ```
//!
//! Protocol-consistency cases (terminal order, lagging dose) are mostly NOT
//! errors on the wire - handlers answer them with `continue: false` payloads
//! so an in-flight device is told to stop without treating the race as a
//! failure. What lands here is the genuinely wrong: bad credentials, foreign
//! orders, unknown ids.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use barkeep_db::DbError;

/// Errors the HTTP handlers can answer with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No token in the request body.
    #[error("No token provided")]
    MissingToken,

    /// Token matched no enrolled device.
    #[error("Invalid token")]
    InvalidToken,

    /// The client identity is inside a throttle block.
    #[error("Too many failed attempts, try again later")]
    Throttled,

    /// Malformed or inconsistent request payload.
    #[error("{0}")]
    BadRequest(String),

    /// The device tried to act on an order it does not own.
    #[error("{0}")]
    Forbidden(String),

    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Anything that should not leak detail to the device.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingToken | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Throttled => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::NotFound { entity, id },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal detail goes to the log, not the device
        match &self {
            ApiError::Internal(detail) => error!(detail = %detail, "Internal error"),
            other => warn!(status = %status, error = %other, "Request rejected"),
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Result type for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;
