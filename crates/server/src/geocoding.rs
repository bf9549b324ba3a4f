//! Place name to coordinate resolution.
//!
//! Successful lookups are memoized in-process for a day. Misses are not
//! cached, so a place that starts resolving upstream is picked up on the
//! next request.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use weathervane_core::Coordinate;

const MEMO_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const MEMO_CAPACITY: u64 = 10_000;

/// Geocoding failures.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The service answered but knows no such place.
    #[error("City not found")]
    NotFound,

    /// The service could not be reached or answered with an error.
    #[error("geocoding service error: {0}")]
    Upstream(String),
}

impl GeocodeError {
    /// Whether this is a definitive "no such place" answer.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Resolves a free-text place name to a coordinate.
#[async_trait]
pub trait CoordinateResolver: Send + Sync + std::fmt::Debug {
    /// Resolve `city` to its first matching coordinate.
    async fn resolve(&self, city: &str) -> Result<Coordinate, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Option<Vec<SearchResult>>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    latitude: f64,
    longitude: f64,
}

/// Open-Meteo geocoding search client.
#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    client: reqwest::Client,
    endpoint: Url,
    memo: Cache<String, Coordinate>,
}

impl OpenMeteoGeocoder {
    /// Create a geocoder against `endpoint`.
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        let memo = Cache::builder()
            .max_capacity(MEMO_CAPACITY)
            .time_to_live(MEMO_TTL)
            .build();
        Self {
            client,
            endpoint,
            memo,
        }
    }

    async fn search(&self, city: &str) -> Result<Coordinate, GeocodeError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("name", city)
            .append_pair("count", "1");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GeocodeError::Upstream(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Upstream(format!("status {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| GeocodeError::Upstream(format!("invalid response: {}", e.without_url())))?;

        let first = body
            .results
            .and_then(|results| results.into_iter().next())
            .ok_or(GeocodeError::NotFound)?;

        Coordinate::new(first.latitude, first.longitude)
            .map_err(|e| GeocodeError::Upstream(format!("invalid coordinate: {e}")))
    }
}

#[async_trait]
impl CoordinateResolver for OpenMeteoGeocoder {
    #[tracing::instrument(skip(self))]
    async fn resolve(&self, city: &str) -> Result<Coordinate, GeocodeError> {
        let key = city.to_lowercase();
        if let Some(coordinate) = self.memo.get(&key).await {
            tracing::debug!(%coordinate, "Geocoding memo hit");
            return Ok(coordinate);
        }

        let coordinate = self.search(city).await?;
        self.memo.insert(key, coordinate).await;
        tracing::debug!(%coordinate, "Geocoded");
        Ok(coordinate)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::providers::build_client;

    fn geocoder(server: &MockServer) -> OpenMeteoGeocoder {
        let endpoint = Url::parse(&format!("{}/v1/search", server.uri())).unwrap();
        OpenMeteoGeocoder::new(build_client(Duration::from_secs(5)).unwrap(), endpoint)
    }

    #[tokio::test]
    async fn test_resolves_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "London"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"name": "London", "latitude": 51.508_53, "longitude": -0.125_74},
                    {"name": "London", "latitude": 42.983_39, "longitude": -81.233_04}
                ]
            })))
            .mount(&server)
            .await;

        let coordinate = geocoder(&server).resolve("London").await.unwrap();
        assert_eq!(coordinate.latitude(), 51.508_53);
        assert_eq!(coordinate.longitude(), -0.125_74);
    }

    #[tokio::test]
    async fn test_missing_results_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"generationtime_ms": 0.5})))
            .mount(&server)
            .await;

        let err = geocoder(&server).resolve("Nowhereville").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_empty_results_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let err = geocoder(&server).resolve("Nowhereville").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = geocoder(&server).resolve("London").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_successful_lookups_are_memoized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"latitude": 35.6895, "longitude": 139.691_71}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let geocoder = geocoder(&server);
        let first = geocoder.resolve("Tokyo").await.unwrap();
        let second = geocoder.resolve("tokyo").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_not_found_is_not_memoized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(2)
            .mount(&server)
            .await;

        let geocoder = geocoder(&server);
        assert!(geocoder.resolve("Atlantis").await.is_err());
        assert!(geocoder.resolve("Atlantis").await.is_err());
    }
}
