//! Weather providers and the ordered chain that tries them.
//!
//! Each provider answers "current weather at this coordinate" with an opaque
//! JSON payload. The chain tries providers in configured order, bounds every
//! attempt with the upstream timeout, and returns the first non-empty payload
//! together with the provider that produced it.

mod open_meteo;
mod openweather;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use weathervane_core::{Coordinate, ProviderId};

use crate::config::UpstreamConfig;

pub use open_meteo::OpenMeteoProvider;
pub use openweather::OpenWeatherProvider;

/// Response bodies are cut to this many characters in error messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Failure of a single provider attempt.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The HTTP client's own deadline fired before the chain's.
    #[error("request timed out")]
    RequestTimeout,

    #[error("empty payload")]
    EmptyPayload,

    #[error("parse error: {0}")]
    Parse(String),
}

/// Failure of the whole chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("no weather providers configured")]
    NoProviders,

    #[error("all {attempted} weather providers failed; last error: {last}")]
    AllProvidersFailed {
        attempted: usize,
        #[source]
        last: ProviderError,
    },
}

/// A source of current weather by coordinate.
#[async_trait]
pub trait WeatherProvider: Send + Sync + std::fmt::Debug {
    /// Stable identifier, used as the response source tag.
    fn id(&self) -> ProviderId;

    /// Fetch current conditions at `coordinate`.
    async fn fetch(&self, coordinate: Coordinate) -> Result<serde_json::Value, ProviderError>;
}

/// A payload together with the provider that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedWeather {
    pub payload: serde_json::Value,
    pub provider: ProviderId,
}

/// Ordered list of providers tried until one succeeds.
#[derive(Debug, Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn WeatherProvider>>,
    timeout: Duration,
}

impl ProviderChain {
    /// Create a chain from providers in priority order.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn WeatherProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Build the configured chain: the alternate provider first when
    /// enabled, Open-Meteo always last.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = build_client(config.timeout)?;

        let mut providers: Vec<Arc<dyn WeatherProvider>> = Vec::with_capacity(2);
        if let Some(alternate) = &config.alternate {
            providers.push(Arc::new(OpenWeatherProvider::new(
                client.clone(),
                alternate.url.clone(),
                alternate.api_key.clone(),
            )));
        }
        providers.push(Arc::new(OpenMeteoProvider::new(
            client,
            config.open_meteo_url.clone(),
        )));

        Ok(Self::new(providers, config.timeout))
    }

    /// Identifiers of the configured providers, in order.
    #[must_use]
    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Try each provider in order and return the first usable payload.
    ///
    /// # Errors
    ///
    /// Returns `ChainError::AllProvidersFailed` carrying the last failure
    /// when every provider failed.
    #[tracing::instrument(skip_all, fields(coordinate = %coordinate))]
    pub async fn fetch(&self, coordinate: Coordinate) -> Result<FetchedWeather, ChainError> {
        let mut last_error = None;

        for provider in &self.providers {
            let provider_id = provider.id();
            let attempt = tokio::time::timeout(self.timeout, provider.fetch(coordinate)).await;

            let error = match attempt {
                Ok(Ok(payload)) if !is_empty_payload(&payload) => {
                    tracing::debug!(provider = %provider_id, "Provider succeeded");
                    return Ok(FetchedWeather {
                        payload,
                        provider: provider_id,
                    });
                }
                Ok(Ok(_)) => ProviderError::EmptyPayload,
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout(self.timeout),
            };

            tracing::warn!(provider = %provider_id, error = %error, "Provider failed, trying next");
            last_error = Some(error);
        }

        match last_error {
            Some(last) => Err(ChainError::AllProvidersFailed {
                attempted: self.providers.len(),
                last,
            }),
            None => Err(ChainError::NoProviders),
        }
    }
}

/// Build the shared HTTP client for upstream calls.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("weathervane/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// `null`, `{}` and `[]` count as no data.
fn is_empty_payload(payload: &serde_json::Value) -> bool {
    match payload {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// GET a URL and decode the body as JSON, mapping failures to `ProviderError`.
async fn get_json(
    client: &reqwest::Client,
    url: url::Url,
) -> Result<serde_json::Value, ProviderError> {
    let response = client.get(url).send().await.map_err(map_reqwest_error)?;

    let status = response.status();
    let body = response.text().await.map_err(map_reqwest_error)?;

    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))
}

fn map_reqwest_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::RequestTimeout
    } else {
        ProviderError::Http(error)
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{truncated}...")
    } else {
        body.to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[derive(Debug)]
    enum Behavior {
        Succeed(serde_json::Value),
        Fail,
        Hang,
    }

    #[derive(Debug)]
    struct StubProvider {
        id: ProviderId,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn new(id: ProviderId, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl WeatherProvider for StubProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn fetch(&self, _: Coordinate) -> Result<serde_json::Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Succeed(payload) => Ok(payload.clone()),
                Behavior::Fail => Err(ProviderError::Status {
                    status: 503,
                    body: "unavailable".to_owned(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(json!({"late": true}))
                }
            }
        }
    }

    fn coordinate() -> Coordinate {
        Coordinate::new(51.5, -0.1).unwrap()
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let first = StubProvider::new(ProviderId::OpenWeather, Behavior::Succeed(json!({"a": 1})));
        let second = StubProvider::new(ProviderId::OpenMeteo, Behavior::Succeed(json!({"b": 2})));
        let chain = ProviderChain::new(
            vec![first.clone(), second.clone()],
            Duration::from_secs(1),
        );

        let fetched = chain.fetch(coordinate()).await.unwrap();
        assert_eq!(fetched.provider, ProviderId::OpenWeather);
        assert_eq!(fetched.payload, json!({"a": 1}));
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_through_on_failure() {
        let first = StubProvider::new(ProviderId::OpenWeather, Behavior::Fail);
        let second = StubProvider::new(ProviderId::OpenMeteo, Behavior::Succeed(json!({"b": 2})));
        let chain = ProviderChain::new(vec![first, second], Duration::from_secs(1));

        let fetched = chain.fetch(coordinate()).await.unwrap();
        assert_eq!(fetched.provider, ProviderId::OpenMeteo);
    }

    #[tokio::test]
    async fn test_empty_payload_falls_through() {
        let first = StubProvider::new(ProviderId::OpenWeather, Behavior::Succeed(json!({})));
        let second = StubProvider::new(ProviderId::OpenMeteo, Behavior::Succeed(json!({"b": 2})));
        let chain = ProviderChain::new(vec![first, second], Duration::from_secs(1));

        let fetched = chain.fetch(coordinate()).await.unwrap();
        assert_eq!(fetched.provider, ProviderId::OpenMeteo);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_through() {
        let first = StubProvider::new(ProviderId::OpenWeather, Behavior::Hang);
        let second = StubProvider::new(ProviderId::OpenMeteo, Behavior::Succeed(json!({"b": 2})));
        let chain = ProviderChain::new(vec![first, second], Duration::from_secs(2));

        let fetched = chain.fetch(coordinate()).await.unwrap();
        assert_eq!(fetched.provider, ProviderId::OpenMeteo);
    }

    #[tokio::test]
    async fn test_all_failed_carries_last_error() {
        let first = StubProvider::new(ProviderId::OpenWeather, Behavior::Succeed(json!(null)));
        let second = StubProvider::new(ProviderId::OpenMeteo, Behavior::Fail);
        let chain = ProviderChain::new(vec![first, second], Duration::from_secs(1));

        let err = chain.fetch(coordinate()).await.unwrap_err();
        match err {
            ChainError::AllProvidersFailed { attempted, last } => {
                assert_eq!(attempted, 2);
                assert!(matches!(last, ProviderError::Status { status: 503, .. }));
            }
            ChainError::NoProviders => panic!("expected AllProvidersFailed"),
        }
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let chain = ProviderChain::new(Vec::new(), Duration::from_secs(1));
        let err = chain.fetch(coordinate()).await.unwrap_err();
        assert!(matches!(err, ChainError::NoProviders));
    }

    #[test]
    fn test_timeout_messages() {
        assert_eq!(
            ProviderError::Timeout(Duration::from_secs(5)).to_string(),
            "timed out after 5s"
        );
        assert_eq!(ProviderError::RequestTimeout.to_string(), "request timed out");
    }

    #[test]
    fn test_is_empty_payload() {
        assert!(is_empty_payload(&json!(null)));
        assert!(is_empty_payload(&json!({})));
        assert!(is_empty_payload(&json!([])));
        assert!(!is_empty_payload(&json!({"temp": 1})));
        assert!(!is_empty_payload(&json!(0)));
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        let long = "x".repeat(300);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.len(), MAX_ERROR_BODY_CHARS + 3);
        assert!(truncated.ends_with("..."));
    }
}
