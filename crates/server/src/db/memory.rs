//! In-memory repositories for tests and local runs without `PostgreSQL`.
//!
//! Both repositories can be switched into an unavailable state to simulate
//! an unreachable store.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use weathervane_core::{
    Coordinate, CoordinateRange, HistoryEntryId, SearchHistoryEntry, SearchHistoryRecord,
    SnapshotId, WeatherSnapshot,
};

use super::{HistoryRepository, RepositoryError, SnapshotRepository};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Snapshot repository held in process memory.
#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    rows: Mutex<Vec<WeatherSnapshot>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemorySnapshotRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Store a snapshot with an explicit timestamp.
    pub fn insert_at(
        &self,
        coordinate: Coordinate,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> WeatherSnapshot {
        let snapshot = WeatherSnapshot {
            id: SnapshotId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            coordinate,
            payload,
            created_at,
        };
        lock(&self.rows).push(snapshot.clone());
        snapshot
    }

    /// Every stored snapshot, in insertion order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<WeatherSnapshot> {
        lock(&self.rows).clone()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable);
        }
        Ok(())
    }

    fn newest_matching<P>(&self, fresh_after: DateTime<Utc>, predicate: P) -> Option<WeatherSnapshot>
    where
        P: Fn(&WeatherSnapshot) -> bool,
    {
        lock(&self.rows)
            .iter()
            .filter(|s| s.created_at > fresh_after && predicate(s))
            .max_by_key(|s| (s.created_at, s.id))
            .cloned()
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn latest_exact(
        &self,
        coordinate: Coordinate,
        fresh_after: DateTime<Utc>,
    ) -> Result<Option<WeatherSnapshot>, RepositoryError> {
        self.check()?;
        Ok(self.newest_matching(fresh_after, |s| s.coordinate == coordinate))
    }

    async fn latest_in_range(
        &self,
        range: CoordinateRange,
        fresh_after: DateTime<Utc>,
    ) -> Result<Option<WeatherSnapshot>, RepositoryError> {
        self.check()?;
        Ok(self.newest_matching(fresh_after, |s| range.contains(&s.coordinate)))
    }

    async fn insert(
        &self,
        coordinate: Coordinate,
        payload: &serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Result<WeatherSnapshot, RepositoryError> {
        self.check()?;
        Ok(self.insert_at(coordinate, payload.clone(), created_at))
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        self.check()?;
        let mut rows = lock(&self.rows);
        let before = rows.len();
        rows.retain(|s| s.created_at > cutoff);
        Ok(u64::try_from(before - rows.len()).unwrap_or(u64::MAX))
    }
}

/// History repository held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryHistoryRepository {
    rows: Mutex<Vec<SearchHistoryRecord>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemoryHistoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every stored record, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<SearchHistoryRecord> {
        lock(&self.rows).clone()
    }

    /// Wait until at least `count` records exist, or `timeout` elapses.
    ///
    /// History writes are dispatched in the background, so callers that
    /// need to observe them poll through this.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<SearchHistoryRecord> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let records = self.records();
            if records.len() >= count || tokio::time::Instant::now() >= deadline {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn insert(&self, entry: &SearchHistoryEntry) -> Result<HistoryEntryId, RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable);
        }
        let id = HistoryEntryId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        lock(&self.rows).push(SearchHistoryRecord {
            id,
            entry: entry.clone(),
        });
        Ok(id)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<SearchHistoryRecord>, RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable);
        }
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut records = self.records();
        records.sort_by(|a, b| {
            b.entry
                .created_at
                .cmp(&a.entry.created_at)
                .then(b.id.cmp(&a.id))
        });
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use serde_json::json;

    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[tokio::test]
    async fn test_latest_exact_prefers_newest() {
        let repo = InMemorySnapshotRepository::new();
        let now = Utc::now();
        repo.insert_at(coord(1.0, 2.0), json!({"n": 1}), now - TimeDelta::minutes(5));
        repo.insert_at(coord(1.0, 2.0), json!({"n": 2}), now - TimeDelta::minutes(1));

        let found = repo
            .latest_exact(coord(1.0, 2.0), now - TimeDelta::minutes(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.payload, json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_fresh_after_is_exclusive() {
        let repo = InMemorySnapshotRepository::new();
        let cutoff = Utc::now() - TimeDelta::minutes(30);
        repo.insert_at(coord(1.0, 2.0), json!({}), cutoff);

        let found = repo.latest_exact(coord(1.0, 2.0), cutoff).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_delete_older_than() {
        let repo = InMemorySnapshotRepository::new();
        let now = Utc::now();
        repo.insert_at(coord(1.0, 2.0), json!({}), now - TimeDelta::hours(48));
        repo.insert_at(coord(1.0, 2.0), json!({}), now);

        let removed = repo
            .delete_older_than(now - TimeDelta::hours(24))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(repo.snapshots().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_snapshot_store() {
        let repo = InMemorySnapshotRepository::new();
        repo.set_unavailable(true);
        let result = repo.latest_exact(coord(0.0, 0.0), Utc::now()).await;
        assert!(matches!(result, Err(RepositoryError::Unavailable)));
    }

    #[tokio::test]
    async fn test_history_recent_newest_first_and_limited() {
        let repo = InMemoryHistoryRepository::new();
        let now = Utc::now();
        for minutes in [3, 1, 2] {
            let entry = SearchHistoryEntry {
                city_name: Some(format!("city-{minutes}")),
                coordinate: coord(0.0, 0.0),
                attribution: None,
                ip: None,
                created_at: now - TimeDelta::minutes(minutes),
            };
            repo.insert(&entry).await.unwrap();
        }

        let recent = repo.recent(2).await.unwrap();
        let names: Vec<_> = recent
            .iter()
            .map(|r| r.entry.city_name.clone().unwrap())
            .collect();
        assert_eq!(names, ["city-1", "city-2"]);
    }
}
