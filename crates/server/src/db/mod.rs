//! Persistence for snapshots and search history.
//!
//! # Tables
//!
//! - `weather_snapshot` - Immutable provider payloads keyed by rounded coordinate
//! - `search_history` - One row per resolution attempt
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p weathervane-cli -- migrate
//! ```
//!
//! The server never migrates on startup.
//!
//! Both repositories are traits so the resolution pipeline can run against
//! `PostgreSQL` in production and against [`memory`] in tests.

pub mod history;
pub mod memory;
pub mod snapshots;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use weathervane_core::{
    Coordinate, CoordinateRange, HistoryEntryId, SearchHistoryEntry, SearchHistoryRecord,
    WeatherSnapshot,
};

pub use history::PgHistoryRepository;
pub use memory::{InMemoryHistoryRepository, InMemorySnapshotRepository};
pub use snapshots::PgSnapshotRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The backing store cannot be reached.
    #[error("store unavailable")]
    Unavailable,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Storage for weather snapshots.
///
/// Freshness bounds are exclusive: a snapshot qualifies only when its
/// `created_at` is strictly after `fresh_after`.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Newest snapshot stored at exactly `coordinate` and written after `fresh_after`.
    async fn latest_exact(
        &self,
        coordinate: Coordinate,
        fresh_after: DateTime<Utc>,
    ) -> Result<Option<WeatherSnapshot>, RepositoryError>;

    /// Newest snapshot inside `range` (bounds inclusive) and written after `fresh_after`.
    async fn latest_in_range(
        &self,
        range: CoordinateRange,
        fresh_after: DateTime<Utc>,
    ) -> Result<Option<WeatherSnapshot>, RepositoryError>;

    /// Append a snapshot.
    async fn insert(
        &self,
        coordinate: Coordinate,
        payload: &serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Result<WeatherSnapshot, RepositoryError>;

    /// Remove snapshots written at or before `cutoff`, returning how many were removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// Storage for search history.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Append an entry.
    async fn insert(&self, entry: &SearchHistoryEntry) -> Result<HistoryEntryId, RepositoryError>;

    /// Most recent entries, newest first.
    async fn recent(&self, limit: i64) -> Result<Vec<SearchHistoryRecord>, RepositoryError>;
}
