//! `PostgreSQL` snapshot repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use weathervane_core::{Coordinate, CoordinateRange, SnapshotId, WeatherSnapshot};

use super::{RepositoryError, SnapshotRepository};

/// Internal row type for `weather_snapshot` queries.
#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    id: SnapshotId,
    latitude: f64,
    longitude: f64,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for WeatherSnapshot {
    type Error = RepositoryError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let coordinate = Coordinate::new(row.latitude, row.longitude).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid coordinate in snapshot {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            coordinate,
            payload: row.payload,
            created_at: row.created_at,
        })
    }
}

/// Snapshot repository backed by the `weather_snapshot` table.
#[derive(Debug, Clone)]
pub struct PgSnapshotRepository {
    pool: PgPool,
}

impl PgSnapshotRepository {
    /// Create a new snapshot repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotRepository for PgSnapshotRepository {
    async fn latest_exact(
        &self,
        coordinate: Coordinate,
        fresh_after: DateTime<Utc>,
    ) -> Result<Option<WeatherSnapshot>, RepositoryError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r"
            SELECT id, latitude, longitude, payload, created_at
            FROM weather_snapshot
            WHERE latitude = $1 AND longitude = $2 AND created_at > $3
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(coordinate.latitude())
        .bind(coordinate.longitude())
        .bind(fresh_after)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn latest_in_range(
        &self,
        range: CoordinateRange,
        fresh_after: DateTime<Utc>,
    ) -> Result<Option<WeatherSnapshot>, RepositoryError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r"
            SELECT id, latitude, longitude, payload, created_at
            FROM weather_snapshot
            WHERE latitude BETWEEN $1 AND $2
              AND longitude BETWEEN $3 AND $4
              AND created_at > $5
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(range.min_latitude)
        .bind(range.max_latitude)
        .bind(range.min_longitude)
        .bind(range.max_longitude)
        .bind(fresh_after)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert(
        &self,
        coordinate: Coordinate,
        payload: &serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Result<WeatherSnapshot, RepositoryError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r"
            INSERT INTO weather_snapshot (latitude, longitude, payload, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, latitude, longitude, payload, created_at
            ",
        )
        .bind(coordinate.latitude())
        .bind(coordinate.longitude())
        .bind(payload)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM weather_snapshot WHERE created_at <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
