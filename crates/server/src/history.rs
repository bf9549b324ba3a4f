//! Background search history recording.
//!
//! Writes are dispatched onto the runtime and never awaited by the request
//! path. Failures are logged and dropped.

use std::sync::Arc;

use tokio::task::JoinHandle;

use weathervane_core::SearchHistoryEntry;

use crate::db::HistoryRepository;

/// Fire-and-forget writer for [`SearchHistoryEntry`] rows.
#[derive(Clone)]
pub struct HistoryRecorder {
    repository: Arc<dyn HistoryRepository>,
}

impl std::fmt::Debug for HistoryRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryRecorder").finish_non_exhaustive()
    }
}

impl HistoryRecorder {
    /// Create a recorder over a repository.
    #[must_use]
    pub fn new(repository: Arc<dyn HistoryRepository>) -> Self {
        Self { repository }
    }

    /// Dispatch a write without waiting for it.
    ///
    /// The returned handle may be awaited by callers that need to observe
    /// completion; the request path drops it.
    pub fn record(&self, entry: SearchHistoryEntry) -> JoinHandle<()> {
        let repository = Arc::clone(&self.repository);

        tokio::spawn(async move {
            match repository.insert(&entry).await {
                Ok(id) => {
                    tracing::debug!(history_id = %id, "Search history recorded");
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        city = ?entry.city_name,
                        coordinate = %entry.coordinate,
                        "Failed to record search history"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use tracing::Level;
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use weathervane_core::Coordinate;

    use super::*;
    use crate::db::InMemoryHistoryRepository;

    fn entry() -> SearchHistoryEntry {
        SearchHistoryEntry {
            city_name: Some("Lisbon".to_owned()),
            coordinate: Coordinate::new(38.717, -9.139).unwrap(),
            attribution: None,
            ip: Some("203.0.113.9".to_owned()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_writes_entry() {
        let repo = Arc::new(InMemoryHistoryRepository::new());
        let recorder = HistoryRecorder::new(repo.clone());

        recorder.record(entry()).await.unwrap();

        let records = repo.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entry.city_name.as_deref(), Some("Lisbon"));
        assert_eq!(records[0].entry.ip.as_deref(), Some("203.0.113.9"));
    }

    /// Records the level of every event it sees.
    #[derive(Clone, Default)]
    struct Levels(Arc<Mutex<Vec<Level>>>);

    impl<S: tracing::Subscriber> Layer<S> for Levels {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    #[tokio::test]
    async fn test_record_failure_is_swallowed() {
        let levels = Levels::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(levels.clone()),
        );

        let repo = Arc::new(InMemoryHistoryRepository::new());
        repo.set_unavailable(true);
        let recorder = HistoryRecorder::new(repo.clone());

        // The task completes without panicking.
        recorder.record(entry()).await.unwrap();
        assert!(repo.records().is_empty());

        let seen = levels.0.lock().unwrap().clone();
        assert!(seen.contains(&Level::WARN));
        assert!(!seen.contains(&Level::ERROR));
    }
}
