//! Weather provider identifiers and the source tag attached to responses.

use core::fmt;

use serde::{Serialize, Serializer};

/// External weather data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    /// Open-Meteo forecast API (no key required).
    OpenMeteo,
    /// OpenWeather current weather API (requires a key).
    OpenWeather,
}

impl ProviderId {
    /// Stable name used in logs and as the response `source` tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenMeteo => "open-meteo",
            Self::OpenWeather => "openweather",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolved payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherSource {
    /// Served from a fresh snapshot.
    Cache,
    /// Fetched live from the named provider.
    Live(ProviderId),
}

impl WeatherSource {
    /// The tag emitted to clients: `"cache"` or the provider's name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Live(provider) => provider.as_str(),
        }
    }
}

impl fmt::Display for WeatherSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for WeatherSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
