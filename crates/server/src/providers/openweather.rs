//! OpenWeather current weather provider.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use weathervane_core::{Coordinate, ProviderId};

use super::{ProviderError, WeatherProvider, get_json};

/// Current weather from the OpenWeather API. Requires an API key.
#[derive(Clone)]
pub struct OpenWeatherProvider {
    client: reqwest::Client,
    endpoint: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for OpenWeatherProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherProvider")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl OpenWeatherProvider {
    /// Create a provider against `endpoint`.
    #[must_use]
    pub const fn new(client: reqwest::Client, endpoint: Url, api_key: SecretString) -> Self {
        Self {
            client,
            endpoint,
            api_key,
        }
    }

    fn request_url(&self, coordinate: Coordinate) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("lat", &coordinate.latitude().to_string())
            .append_pair("lon", &coordinate.longitude().to_string())
            .append_pair("appid", self.api_key.expose_secret())
            .append_pair("units", "metric");
        url
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn fetch(&self, coordinate: Coordinate) -> Result<serde_json::Value, ProviderError> {
        // The request URL carries the key; keep it out of error messages.
        get_json(&self.client, self.request_url(coordinate))
            .await
            .map_err(|e| match e {
                ProviderError::Http(inner) => ProviderError::Http(inner.without_url()),
                other => other,
            })
    }
}
