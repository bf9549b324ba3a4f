//! Integration tests for Weathervane.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p weathervane-integration-tests
//! ```
//!
//! Tests drive the real router in-process. Upstream geocoding and weather
//! services are `wiremock` servers; snapshots and history live in the
//! in-memory repositories. No database or network access is needed.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weathervane_core::CoordinatePrecision;
use weathervane_server::attribution::AttributionExtractor;
use weathervane_server::config::{AlternateProviderConfig, UpstreamConfig};
use weathervane_server::db::{InMemoryHistoryRepository, InMemorySnapshotRepository};
use weathervane_server::geocoding::OpenMeteoGeocoder;
use weathervane_server::history::HistoryRecorder;
use weathervane_server::providers::{ProviderChain, build_client};
use weathervane_server::resolver::WeatherResolver;
use weathervane_server::store::SnapshotStore;
use weathervane_server::{AppState, router};

/// Signing secret shared by the service under test and [`token_for`].
pub const JWT_SECRET: &str = "kT9#vQ2$mW7!pL4@xR8&nB3*cZ6^hF1%";

/// Freshness window used by every test context.
pub const CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Maximum history rows returned by the listing in tests.
pub const HISTORY_LIMIT: i64 = 50;

/// How long to wait for background history writes.
pub const HISTORY_WAIT: Duration = Duration::from_secs(2);

const GEOCODING_PATH: &str = "/v1/search";
const OPEN_METEO_PATH: &str = "/v1/forecast";
const OPENWEATHER_PATH: &str = "/data/2.5/weather";

/// A fully wired service with mocked upstreams.
pub struct TestContext {
    pub geocoding: MockServer,
    pub open_meteo: MockServer,
    pub openweather: MockServer,
    pub snapshots: Arc<InMemorySnapshotRepository>,
    pub history: Arc<InMemoryHistoryRepository>,
    router: Router,
}

/// Status, headers, and decoded JSON body of a response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestContext {
    /// Open-Meteo as the only weather provider.
    pub async fn new() -> Self {
        Self::build(false).await
    }

    /// OpenWeather first, Open-Meteo as fallback.
    pub async fn with_alternate_provider() -> Self {
        Self::build(true).await
    }

    async fn build(alternate: bool) -> Self {
        let geocoding = MockServer::start().await;
        let open_meteo = MockServer::start().await;
        let openweather = MockServer::start().await;

        let upstream = UpstreamConfig {
            timeout: Duration::from_secs(2),
            geocoding_url: endpoint(&geocoding, GEOCODING_PATH),
            open_meteo_url: endpoint(&open_meteo, OPEN_METEO_PATH),
            alternate: alternate.then(|| AlternateProviderConfig {
                url: endpoint(&openweather, OPENWEATHER_PATH),
                api_key: SecretString::from("test-api-key"),
            }),
        };

        let snapshots = Arc::new(InMemorySnapshotRepository::new());
        let history = Arc::new(InMemoryHistoryRepository::new());

        let resolver = WeatherResolver::new(
            Arc::new(OpenMeteoGeocoder::new(
                build_client(upstream.timeout).unwrap(),
                upstream.geocoding_url.clone(),
            )),
            SnapshotStore::new(snapshots.clone(), CoordinatePrecision::default()),
            ProviderChain::from_config(&upstream).unwrap(),
            AttributionExtractor::new(&SecretString::from(JWT_SECRET)),
            HistoryRecorder::new(history.clone()),
            CACHE_TTL,
        );

        let state = AppState::from_parts(resolver, history.clone(), HISTORY_LIMIT, None);

        Self {
            geocoding,
            open_meteo,
            openweather,
            snapshots,
            history,
            router: router(state),
        }
    }

    /// Make the geocoder resolve `name` to one candidate.
    pub async fn geocode(&self, name: &str, latitude: f64, longitude: f64) {
        Mock::given(method("GET"))
            .and(path(GEOCODING_PATH))
            .and(query_param("name", name))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"name": name, "latitude": latitude, "longitude": longitude}]
            })))
            .mount(&self.geocoding)
            .await;
    }

    /// Make the geocoder answer every search with zero candidates.
    pub async fn geocode_nothing(&self) {
        Mock::given(method("GET"))
            .and(path(GEOCODING_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"generationtime_ms": 0.4})))
            .mount(&self.geocoding)
            .await;
    }

    /// Make Open-Meteo answer with `payload`, expecting exactly `calls` requests.
    pub async fn open_meteo_returns(&self, payload: Value, calls: u64) {
        Mock::given(method("GET"))
            .and(path(OPEN_METEO_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload))
            .expect(calls)
            .mount(&self.open_meteo)
            .await;
    }

    /// Make Open-Meteo fail with `status`.
    pub async fn open_meteo_fails(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(OPEN_METEO_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream exploded"))
            .mount(&self.open_meteo)
            .await;
    }

    /// Make OpenWeather fail with `status`.
    pub async fn openweather_fails(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(OPENWEATHER_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"cod": status})))
            .mount(&self.openweather)
            .await;
    }

    /// Make OpenWeather answer with `payload`.
    pub async fn openweather_returns(&self, payload: Value) {
        Mock::given(method("GET"))
            .and(path(OPENWEATHER_PATH))
            .and(query_param("appid", "test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload))
            .mount(&self.openweather)
            .await;
    }

    /// `GET` a URI.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    /// `GET` a URI with a bearer token.
    pub async fn get_with_token(&self, uri: &str, token: &str) -> TestResponse {
        let request = Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// `POST` a JSON body.
    pub async fn post_json(&self, uri: &str, body: &Value) -> TestResponse {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send an arbitrary request through the router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Issue an HS256 token signed with [`JWT_SECRET`], expiring `expires_in_secs`
/// from now (negative for an already expired token).
#[must_use]
pub fn token_for(id: &str, email: &str, expires_in_secs: i64) -> String {
    let claims = json!({
        "id": id,
        "email": email,
        "exp": chrono::Utc::now().timestamp() + expires_in_secs,
    });
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn endpoint(server: &MockServer, path: &str) -> Url {
    Url::parse(&format!("{}{path}", server.uri())).unwrap()
}
