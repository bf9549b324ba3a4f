//! Cached weather snapshots and the freshness rule applied to them.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::coordinate::Coordinate;
use super::id::SnapshotId;

/// One immutable stored weather result for a rounded coordinate.
///
/// Snapshots are never updated; newer snapshots at the same or nearby
/// coordinates supersede older ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Row identifier.
    pub id: SnapshotId,
    /// Rounded coordinate the payload was fetched for.
    pub coordinate: Coordinate,
    /// Provider payload, stored as-is.
    pub payload: serde_json::Value,
    /// When the snapshot was written.
    pub created_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    /// Whether this snapshot may still be served at `now`.
    #[must_use]
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        is_fresh(self.created_at, ttl, now)
    }
}

/// Freshness predicate: `now - created_at < ttl`.
///
/// A snapshot exactly `ttl` old is stale.
#[must_use]
pub fn is_fresh(created_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    let Ok(ttl) = TimeDelta::from_std(ttl) else {
        // Longer than chrono can represent: nothing is ever too old.
        return true;
    };
    now.signed_duration_since(created_at) < ttl
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30 * 60);

    #[test]
    fn test_fresh_inside_window() {
        let now = Utc::now();
        assert!(is_fresh(now - TimeDelta::minutes(29), TTL, now));
        assert!(is_fresh(now, TTL, now));
    }

    #[test]
    fn test_exact_boundary_is_stale() {
        let now = Utc::now();
        assert!(!is_fresh(now - TimeDelta::minutes(30), TTL, now));
    }

    #[test]
    fn test_older_is_stale() {
        let now = Utc::now();
        assert!(!is_fresh(now - TimeDelta::hours(2), TTL, now));
    }

    #[test]
    fn test_zero_ttl_is_always_stale() {
        let now = Utc::now();
        assert!(!is_fresh(now, Duration::ZERO, now));
    }
}
