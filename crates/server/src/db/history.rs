//! `PostgreSQL` search history repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use weathervane_core::{
    Attribution, Coordinate, HistoryEntryId, SearchHistoryEntry, SearchHistoryRecord, UserId,
};

use super::{HistoryRepository, RepositoryError};

/// Internal row type for `search_history` queries.
#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: HistoryEntryId,
    city_name: Option<String>,
    latitude: f64,
    longitude: f64,
    user_id: Option<String>,
    user_name: Option<String>,
    user_token: Option<String>,
    ip: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for SearchHistoryRecord {
    type Error = RepositoryError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let coordinate = Coordinate::new(row.latitude, row.longitude).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid coordinate in history {}: {e}", row.id))
        })?;

        // Attribution columns are written together or not at all.
        let attribution = match (row.user_id, row.user_name, row.user_token) {
            (Some(user_id), Some(user_name), Some(token)) => Some(Attribution {
                user_id: UserId::new(user_id),
                user_name,
                token,
            }),
            (None, None, None) => None,
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "partial attribution in history {}",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: row.id,
            entry: SearchHistoryEntry {
                city_name: row.city_name,
                coordinate,
                attribution,
                ip: row.ip,
                created_at: row.created_at,
            },
        })
    }
}

/// History repository backed by the `search_history` table.
#[derive(Debug, Clone)]
pub struct PgHistoryRepository {
    pool: PgPool,
}

impl PgHistoryRepository {
    /// Create a new history repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRepository for PgHistoryRepository {
    async fn insert(&self, entry: &SearchHistoryEntry) -> Result<HistoryEntryId, RepositoryError> {
        let attribution = entry.attribution.as_ref();

        let id: HistoryEntryId = sqlx::query_scalar(
            r"
            INSERT INTO search_history
                (city_name, latitude, longitude, user_id, user_name, user_token, ip, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(entry.city_name.as_deref())
        .bind(entry.coordinate.latitude())
        .bind(entry.coordinate.longitude())
        .bind(attribution.map(|a| a.user_id.as_str()))
        .bind(attribution.map(|a| a.user_name.as_str()))
        .bind(attribution.map(|a| a.token.as_str()))
        .bind(entry.ip.as_deref())
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<SearchHistoryRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r"
            SELECT id, city_name, latitude, longitude, user_id, user_name, user_token, ip, created_at
            FROM search_history
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
