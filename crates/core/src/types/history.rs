//! Search history entries and requester attribution.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::coordinate::Coordinate;
use super::id::HistoryEntryId;

/// Opaque identifier of an authenticated requester, as issued by the
/// identity service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity attached to a history entry when a verified credential was presented.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Attribution {
    /// Requester identifier.
    pub user_id: UserId,
    /// Display name (the requester's email address).
    pub user_name: String,
    /// The verified bearer token.
    pub token: String,
}

impl fmt::Debug for Attribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribution")
            .field("user_id", &self.user_id)
            .field("user_name", &self.user_name)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// One record of a resolution attempt, written regardless of outcome.
///
/// Coordinates are always the rounded form.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHistoryEntry {
    /// Place name from the request, if one was supplied.
    pub city_name: Option<String>,
    /// Rounded coordinate the request resolved to.
    pub coordinate: Coordinate,
    /// Present only when a credential verified.
    pub attribution: Option<Attribution>,
    /// Caller address, when known.
    pub ip: Option<String>,
    /// When the request was received.
    pub created_at: DateTime<Utc>,
}

/// A persisted [`SearchHistoryEntry`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHistoryRecord {
    /// Row identifier.
    pub id: HistoryEntryId,
    /// The stored entry.
    pub entry: SearchHistoryEntry,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_attribution_debug_redacts_token() {
        let attribution = Attribution {
            user_id: UserId::new("65f1c0ffee"),
            user_name: "ada@example.com".to_owned(),
            token: "eyJhbGciOiJIUzI1NiJ9.secret-part".to_owned(),
        };

        let debug_output = format!("{attribution:?}");

        assert!(debug_output.contains("65f1c0ffee"));
        assert!(debug_output.contains("ada@example.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("secret-part"));
    }

    #[test]
    fn test_user_id_serializes_transparently() {
        let json = serde_json::to_string(&UserId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
