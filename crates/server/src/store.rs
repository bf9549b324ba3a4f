//! Snapshot cache in front of the weather providers.
//!
//! Lookups run in two phases: an exact match on the normalized coordinate,
//! then a range match within the precision's epsilon so snapshots written
//! under a different rounding policy still hit. Store failures never fail a
//! request; they are logged and treated as a miss (lookup) or skipped (save).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use weathervane_core::{Coordinate, CoordinatePrecision, WeatherSnapshot};

use crate::db::SnapshotRepository;

/// Coordinate-keyed snapshot cache.
#[derive(Clone)]
pub struct SnapshotStore {
    repository: Arc<dyn SnapshotRepository>,
    precision: CoordinatePrecision,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("precision", &self.precision)
            .finish_non_exhaustive()
    }
}

impl SnapshotStore {
    /// Create a store over a repository.
    #[must_use]
    pub fn new(repository: Arc<dyn SnapshotRepository>, precision: CoordinatePrecision) -> Self {
        Self {
            repository,
            precision,
        }
    }

    /// Rounding policy applied to every coordinate.
    #[must_use]
    pub const fn precision(&self) -> CoordinatePrecision {
        self.precision
    }

    /// Find the newest snapshot no older than `ttl` for `coordinate`.
    pub async fn lookup(&self, coordinate: Coordinate, ttl: Duration) -> Option<WeatherSnapshot> {
        self.lookup_at(coordinate, ttl, Utc::now()).await
    }

    /// [`Self::lookup`] against an explicit clock.
    #[tracing::instrument(skip_all, fields(coordinate = %coordinate))]
    pub async fn lookup_at(
        &self,
        coordinate: Coordinate,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Option<WeatherSnapshot> {
        let coordinate = self.precision.normalize(coordinate);
        let fresh_after = subtract(now, ttl);

        match self.repository.latest_exact(coordinate, fresh_after).await {
            Ok(Some(snapshot)) if snapshot.is_fresh(ttl, now) => {
                tracing::debug!(snapshot_id = %snapshot.id, "Exact snapshot hit");
                return Some(snapshot);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Exact snapshot lookup failed, treating as miss");
                return None;
            }
        }

        let range = self.precision.range_around(coordinate);
        match self.repository.latest_in_range(range, fresh_after).await {
            Ok(Some(snapshot)) if snapshot.is_fresh(ttl, now) => {
                tracing::debug!(
                    snapshot_id = %snapshot.id,
                    stored_at = %snapshot.coordinate,
                    "Range snapshot hit"
                );
                Some(snapshot)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Range snapshot lookup failed, treating as miss");
                None
            }
        }
    }

    /// Persist a freshly fetched payload under the normalized coordinate.
    ///
    /// Returns `None` when the write failed; the failure is logged.
    pub async fn save(
        &self,
        coordinate: Coordinate,
        payload: &serde_json::Value,
    ) -> Option<WeatherSnapshot> {
        let coordinate = self.precision.normalize(coordinate);
        match self.repository.insert(coordinate, payload, Utc::now()).await {
            Ok(snapshot) => {
                tracing::debug!(snapshot_id = %snapshot.id, coordinate = %coordinate, "Snapshot saved");
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!(error = %e, coordinate = %coordinate, "Failed to save snapshot");
                None
            }
        }
    }

    /// Delete snapshots older than `max_age`.
    ///
    /// # Errors
    ///
    /// Returns the repository error; pruning is an operator action and
    /// does not degrade silently.
    pub async fn prune(&self, max_age: Duration) -> Result<u64, crate::db::RepositoryError> {
        let cutoff = subtract(Utc::now(), max_age);
        let removed = self.repository.delete_older_than(cutoff).await?;
        tracing::info!(removed, "Pruned old snapshots");
        Ok(removed)
    }
}

/// `now - age`, saturating at the earliest representable instant.
fn subtract(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
