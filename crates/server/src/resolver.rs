//! End-to-end weather resolution.
//!
//! ```text
//! parse input -> resolve coordinates -> record history (detached)
//!             -> cache lookup -> [hit] respond
//!                             -> [miss] live fetch -> save snapshot -> respond
//! ```
//!
//! Input errors are reported before any external call is made. History is
//! dispatched once the coordinate is known, so it is recorded whether the
//! cache hits, the providers succeed, or every provider fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use weathervane_core::{
    Coordinate, LocationQuery, NumericInput, QueryError, SearchHistoryEntry, WeatherSource,
};

use crate::attribution::AttributionExtractor;
use crate::geocoding::{CoordinateResolver, GeocodeError};
use crate::history::HistoryRecorder;
use crate::providers::{ChainError, ProviderChain};
use crate::store::SnapshotStore;

/// Failures surfaced by [`WeatherResolver::resolve`].
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Missing or malformed location parameters.
    #[error(transparent)]
    InvalidInput(#[from] QueryError),

    /// The place name has no geocoding candidate.
    #[error("City not found")]
    NotFound,

    /// Geocoding failed for a reason other than "no such place".
    #[error("geocoding failed: {0}")]
    Upstream(#[source] GeocodeError),

    /// Every weather provider failed.
    #[error(transparent)]
    AllProvidersFailed(#[from] ChainError),
}

impl From<GeocodeError> for ResolveError {
    fn from(error: GeocodeError) -> Self {
        if error.is_not_found() {
            Self::NotFound
        } else {
            Self::Upstream(error)
        }
    }
}

/// Raw location parameters plus request metadata.
#[derive(Debug, Clone, Default)]
pub struct WeatherRequest {
    pub city: Option<String>,
    pub latitude: Option<NumericInput>,
    pub longitude: Option<NumericInput>,
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,
    /// Caller address, when known.
    pub ip: Option<String>,
}

/// A resolved payload and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWeather {
    pub source: WeatherSource,
    pub payload: serde_json::Value,
    /// The normalized coordinate the payload belongs to.
    pub coordinate: Coordinate,
}

/// Composes geocoding, caching, live fetching, and history recording.
#[derive(Debug, Clone)]
pub struct WeatherResolver {
    geocoder: Arc<dyn CoordinateResolver>,
    store: SnapshotStore,
    chain: ProviderChain,
    attribution: AttributionExtractor,
    history: HistoryRecorder,
    ttl: Duration,
}

impl WeatherResolver {
    /// Assemble a resolver from its components.
    #[must_use]
    pub fn new(
        geocoder: Arc<dyn CoordinateResolver>,
        store: SnapshotStore,
        chain: ProviderChain,
        attribution: AttributionExtractor,
        history: HistoryRecorder,
        ttl: Duration,
    ) -> Self {
        Self {
            geocoder,
            store,
            chain,
            attribution,
            history,
            ttl,
        }
    }

    /// The attribution extractor shared with the HTTP layer.
    #[must_use]
    pub const fn attribution(&self) -> &AttributionExtractor {
        &self.attribution
    }

    /// Resolve a request into a weather payload.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the location parameters do not validate
    /// - `NotFound` if the place name has no geocoding candidate
    /// - `Upstream` if geocoding fails
    /// - `AllProvidersFailed` if no provider returned a payload
    #[tracing::instrument(skip_all)]
    pub async fn resolve(&self, request: WeatherRequest) -> Result<ResolvedWeather, ResolveError> {
        let received_at = Utc::now();

        let query = LocationQuery::parse(
            request.city.as_deref(),
            request.latitude.as_ref(),
            request.longitude.as_ref(),
        )?;
        tracing::debug!(%query, "Parsed location query");

        let coordinate = match &query {
            LocationQuery::Place(city) => self.geocoder.resolve(city).await?,
            LocationQuery::Coordinates { coordinate, .. } => *coordinate,
        };
        let coordinate = self.store.precision().normalize(coordinate);

        // Dropping the handle detaches the write from this request.
        drop(self.history.record(SearchHistoryEntry {
            city_name: query.city().map(str::to_owned),
            coordinate,
            attribution: self.attribution.extract(request.authorization.as_deref()),
            ip: request.ip,
            created_at: received_at,
        }));

        if let Some(snapshot) = self.store.lookup(coordinate, self.ttl).await {
            tracing::info!(%coordinate, snapshot_id = %snapshot.id, "Serving cached weather");
            return Ok(ResolvedWeather {
                source: WeatherSource::Cache,
                payload: snapshot.payload,
                coordinate,
            });
        }

        let fetched = self.chain.fetch(coordinate).await?;
        tracing::info!(%coordinate, provider = %fetched.provider, "Fetched live weather");

        self.store.save(coordinate, &fetched.payload).await;

        Ok(ResolvedWeather {
            source: WeatherSource::Live(fetched.provider),
            payload: fetched.payload,
            coordinate,
        })
    }
}
