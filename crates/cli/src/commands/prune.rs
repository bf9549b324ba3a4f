//! Snapshot retention command.
//!
//! Snapshots are append-only and nothing else removes them, so operators
//! schedule this (e.g. hourly from cron) to bound table growth.
//!
//! # Usage
//!
//! ```bash
//! wv-cli prune --max-age-hours 24
//! ```

use std::sync::Arc;
use std::time::Duration;

use weathervane_core::CoordinatePrecision;
use weathervane_server::db::{self, PgSnapshotRepository};
use weathervane_server::{config, store::SnapshotStore};

use super::CommandError;

/// Delete snapshots older than `max_age_hours`, returning how many were removed.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails,
/// or the delete fails.
pub async fn run(max_age_hours: u64) -> Result<u64, CommandError> {
    let database_url = config::database_url_from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    // Precision only affects lookups, not deletion.
    let store = SnapshotStore::new(
        Arc::new(PgSnapshotRepository::new(pool)),
        CoordinatePrecision::default(),
    );

    let max_age = Duration::from_secs(max_age_hours.saturating_mul(3600));
    tracing::info!("Deleting snapshots older than {max_age_hours}h...");
    Ok(store.prune(max_age).await?)
}
