//! Search history listing.
//!
//! Requires a verified bearer token. Stored tokens are never returned.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use weathervane_core::SearchHistoryRecord;

use crate::error::{AppError, Result};
use crate::middleware::RequireAttribution;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

/// Public view of a history row.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: i64,
    pub city_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SearchHistoryRecord> for HistoryItem {
    fn from(record: SearchHistoryRecord) -> Self {
        let entry = record.entry;
        let (user_id, user_name) = entry
            .attribution
            .map(|a| (Some(a.user_id.to_string()), Some(a.user_name)))
            .unwrap_or_default();

        Self {
            id: record.id.as_i64(),
            city_name: entry.city_name,
            latitude: entry.coordinate.latitude(),
            longitude: entry.coordinate.longitude(),
            user_id,
            user_name,
            ip: entry.ip,
            created_at: entry.created_at,
        }
    }
}

/// The requested row count, defaulting to and capped at `max`, never below 1.
fn effective_limit(requested: Option<i64>, max: i64) -> i64 {
    let max = max.max(1);
    requested.unwrap_or(max).clamp(1, max)
}

/// `GET /history`
#[tracing::instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    RequireAttribution(who): RequireAttribution,
    params: std::result::Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Vec<HistoryItem>>> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let limit = effective_limit(params.limit, state.history_limit());

    let records = state.history().recent(limit).await?;
    tracing::debug!(user_id = %who.user_id, count = records.len(), "Listed search history");

    Ok(Json(records.into_iter().map(HistoryItem::from).collect()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use weathervane_core::{Attribution, Coordinate, HistoryEntryId, SearchHistoryEntry, UserId};

    use super::*;

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(None, 200), 200);
        assert_eq!(effective_limit(Some(10), 200), 10);
        assert_eq!(effective_limit(Some(500), 200), 200);
        assert_eq!(effective_limit(Some(0), 200), 1);
        assert_eq!(effective_limit(Some(-3), 200), 1);
    }

    #[test]
    fn test_effective_limit_with_degenerate_max() {
        assert_eq!(effective_limit(None, 0), 1);
        assert_eq!(effective_limit(Some(5), -1), 1);
    }

    #[test]
    fn test_item_uses_camel_case_and_hides_token() {
        let record = SearchHistoryRecord {
            id: HistoryEntryId::new(3),
            entry: SearchHistoryEntry {
                city_name: Some("Oslo".to_owned()),
                coordinate: Coordinate::new(59.913, 10.752).unwrap(),
                attribution: Some(Attribution {
                    user_id: UserId::new("42"),
                    user_name: "grace@example.com".to_owned(),
                    token: "secret.jwt.value".to_owned(),
                }),
                ip: None,
                created_at: Utc::now(),
            },
        };

        let json = serde_json::to_value(HistoryItem::from(record)).unwrap();
        assert_eq!(json["cityName"], "Oslo");
        assert_eq!(json["userId"], "42");
        assert_eq!(json["userName"], "grace@example.com");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("city_name").is_none());
        assert!(!json.to_string().contains("secret.jwt.value"));
    }
}
