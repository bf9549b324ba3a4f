//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding. Every error body is JSON: `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::resolver::ResolveError;

/// Application-level error type for the HTTP layer.
#[derive(Debug, Error)]
pub enum AppError {
    /// Weather resolution failed.
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Caller is not authenticated.
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Resolve(ResolveError::InvalidInput(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Resolve(ResolveError::NotFound) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Resolve(ResolveError::Upstream(_) | ResolveError::AllProvidersFailed(_))
            | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the client.
    ///
    /// Server errors get a generic message; the cause is logged and reported.
    fn public_message(&self) -> String {
        match self {
            Self::Resolve(ResolveError::InvalidInput(e)) => e.to_string(),
            Self::Resolve(ResolveError::NotFound) => "City not found".to_string(),
            Self::Resolve(_) => "Failed to fetch weather".to_string(),
            Self::Database(_) => "Internal server error".to_string(),
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
