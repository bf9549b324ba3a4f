//! Open-Meteo forecast provider (no key required).

use async_trait::async_trait;
use url::Url;

use weathervane_core::{Coordinate, ProviderId};

use super::{ProviderError, WeatherProvider, get_json};

/// Current weather from the Open-Meteo forecast API.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    client: reqwest::Client,
    endpoint: Url,
}

impl OpenMeteoProvider {
    /// Create a provider against `endpoint`.
    #[must_use]
    pub const fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    fn request_url(&self, coordinate: Coordinate) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &coordinate.latitude().to_string())
            .append_pair("longitude", &coordinate.longitude().to_string())
            .append_pair("current_weather", "true")
            .append_pair("timezone", "auto");
        url
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    async fn fetch(&self, coordinate: Coordinate) -> Result<serde_json::Value, ProviderError> {
        get_json(&self.client, self.request_url(coordinate)).await
    }
}
