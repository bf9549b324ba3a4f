//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::attribution::AttributionExtractor;
use crate::config::WeatherConfig;
use crate::db::{HistoryRepository, PgHistoryRepository, PgSnapshotRepository};
use crate::geocoding::OpenMeteoGeocoder;
use crate::history::HistoryRecorder;
use crate::providers::{ProviderChain, build_client};
use crate::resolver::WeatherResolver;
use crate::store::SnapshotStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    resolver: WeatherResolver,
    history: Arc<dyn HistoryRepository>,
    history_limit: i64,
    pool: Option<PgPool>,
}

impl AppState {
    /// Wire every component from configuration against `PostgreSQL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream HTTP client cannot be built.
    pub fn new(config: &WeatherConfig, pool: PgPool) -> Result<Self, reqwest::Error> {
        let client = build_client(config.upstream.timeout)?;
        let geocoder = Arc::new(OpenMeteoGeocoder::new(
            client,
            config.upstream.geocoding_url.clone(),
        ));
        let chain = ProviderChain::from_config(&config.upstream)?;
        tracing::info!(providers = ?chain.provider_ids(), "Weather provider chain configured");

        let history: Arc<dyn HistoryRepository> = Arc::new(PgHistoryRepository::new(pool.clone()));
        let store = SnapshotStore::new(
            Arc::new(PgSnapshotRepository::new(pool.clone())),
            config.cache.precision,
        );

        let resolver = WeatherResolver::new(
            geocoder,
            store,
            chain,
            AttributionExtractor::new(&config.jwt_secret),
            HistoryRecorder::new(Arc::clone(&history)),
            config.cache.ttl,
        );

        Ok(Self::from_parts(
            resolver,
            history,
            config.history_limit,
            Some(pool),
        ))
    }

    /// Assemble state from prebuilt components.
    ///
    /// `history` must be the repository the resolver's recorder writes to.
    #[must_use]
    pub fn from_parts(
        resolver: WeatherResolver,
        history: Arc<dyn HistoryRepository>,
        history_limit: i64,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                resolver,
                history,
                history_limit: history_limit.max(1),
                pool,
            }),
        }
    }

    /// Get a reference to the weather resolver.
    #[must_use]
    pub fn resolver(&self) -> &WeatherResolver {
        &self.inner.resolver
    }

    /// Get a reference to the attribution extractor.
    #[must_use]
    pub fn attribution(&self) -> &AttributionExtractor {
        self.inner.resolver.attribution()
    }

    /// Get a reference to the history repository.
    #[must_use]
    pub fn history(&self) -> &dyn HistoryRepository {
        self.inner.history.as_ref()
    }

    /// Maximum rows the history listing returns.
    #[must_use]
    pub fn history_limit(&self) -> i64 {
        self.inner.history_limit
    }

    /// Get a reference to the database connection pool, if one is attached.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
