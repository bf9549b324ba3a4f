//! Requester attribution from bearer tokens.
//!
//! Attribution is best-effort: a missing, malformed, expired, or wrongly
//! signed token yields no attribution and never fails the request.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use weathervane_core::{Attribution, UserId};

/// Identifiers may be issued as strings or numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ClaimId {
    Text(String),
    Number(i64),
}

impl From<ClaimId> for UserId {
    fn from(id: ClaimId) -> Self {
        match id {
            ClaimId::Text(s) => Self::new(s),
            ClaimId::Number(n) => Self::new(n.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Claims {
    id: ClaimId,
    email: String,
}

struct Inner {
    key: DecodingKey,
    validation: Validation,
}

/// Verifies HS256 bearer tokens and turns them into [`Attribution`].
///
/// Implements `Debug` manually to keep the key out of logs.
#[derive(Clone)]
pub struct AttributionExtractor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AttributionExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributionExtractor")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl AttributionExtractor {
    /// Create an extractor verifying with `secret`.
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        Self {
            inner: Arc::new(Inner {
                key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
                validation,
            }),
        }
    }

    /// Extract attribution from an `Authorization` header value.
    ///
    /// Returns `None` unless the header is `Bearer <token>` (scheme
    /// case-insensitive) and the token verifies.
    #[must_use]
    pub fn extract(&self, authorization: Option<&str>) -> Option<Attribution> {
        let token = bearer_token(authorization?)?;

        match decode::<Claims>(token, &self.inner.key, &self.inner.validation) {
            Ok(data) => Some(Attribution {
                user_id: data.claims.id.into(),
                user_name: data.claims.email,
                token: token.to_owned(),
            }),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unverifiable bearer token");
                None
            }
        }
    }
}

/// The token part of a `Bearer <token>` header value.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
