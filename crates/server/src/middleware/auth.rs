//! Bearer-token extractors.
//!
//! Attribution on the weather routes is optional and never rejects. The
//! history listing requires a token that verifies.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use weathervane_core::Attribution;

use crate::state::AppState;

fn authorization_header(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// Extractor that requires a verified bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAttribution(who): RequireAttribution,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", who.user_name)
/// }
/// ```
pub struct RequireAttribution(pub Attribution);

/// Rejection returned when no verified token was presented.
#[derive(Debug)]
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for RequireAttribution {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .attribution()
            .extract(authorization_header(parts))
            .map(Self)
            .ok_or(AuthRejection)
    }
}

/// Extractor that carries the raw `Authorization` header for best-effort
/// attribution further down the pipeline.
///
/// Never rejects.
pub struct OptionalAttribution(pub Option<String>);

impl<S> FromRequestParts<S> for OptionalAttribution
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(authorization_header(parts).map(str::to_owned)))
    }
}
