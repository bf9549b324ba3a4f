//! Service configuration loaded from environment variables.
//!
//! The configuration is read once at startup and passed by reference into
//! every component constructor. No component reads the environment itself.
//!
//! # Environment Variables
//!
//! ## Required
//! - `WEATHERVANE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `JWT_SECRET` - HS256 secret used to verify bearer tokens (min 32 chars, high entropy)
//!
//! ## Optional
//! - `WEATHERVANE_HOST` - Bind address (default: 127.0.0.1)
//! - `WEATHERVANE_PORT` - Listen port (default: 5000)
//! - `CACHE_TTL_MINUTES` - Snapshot freshness window (default: 30)
//! - `COORDINATE_PRECISION` - Decimal digits coordinates are rounded to (default: 3)
//! - `COORDINATE_EPSILON` - Range-match tolerance (default: half a unit at the precision)
//! - `PROVIDER_TIMEOUT_SECS` - Per-call timeout for upstream services (default: 10)
//! - `GEOCODING_URL` - Geocoding endpoint (default: Open-Meteo geocoding)
//! - `OPEN_METEO_URL` - Default weather provider endpoint
//! - `ALTERNATE_PROVIDER_ENABLED` - Try the alternate provider first (default: false)
//! - `ALTERNATE_PROVIDER_URL` - Alternate provider endpoint (default: OpenWeather current weather)
//! - `ALTERNATE_PROVIDER_API_KEY` - Alternate provider key (required when enabled)
//! - `HISTORY_LIMIT` - Maximum rows returned by the history listing (default: 200)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_TRACES_SAMPLE_RATE` - Sentry tracing sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;
use weathervane_core::CoordinatePrecision;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const DEFAULT_OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
const DEFAULT_ALTERNATE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Snapshot cache settings
    pub cache: CacheConfig,
    /// Upstream geocoding and weather provider settings
    pub upstream: UpstreamConfig,
    /// Secret used to verify bearer tokens
    pub jwt_secret: SecretString,
    /// Maximum number of rows the history listing returns
    pub history_limit: i64,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry performance tracing sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Snapshot cache settings.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum age of a snapshot that may be served.
    pub ttl: Duration,
    /// Rounding policy and range-match tolerance.
    pub precision: CoordinatePrecision,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            precision: CoordinatePrecision::default(),
        }
    }
}

/// Upstream service settings.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Bounded timeout applied to every upstream call
    pub timeout: Duration,
    /// Geocoding search endpoint
    pub geocoding_url: Url,
    /// Default weather provider endpoint
    pub open_meteo_url: Url,
    /// Alternate provider, tried first when configured
    pub alternate: Option<AlternateProviderConfig>,
}

/// Alternate (keyed) weather provider.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct AlternateProviderConfig {
    /// Endpoint for current conditions by coordinate
    pub url: Url,
    /// API key sent with each request
    pub api_key: SecretString,
}

impl std::fmt::Debug for AlternateProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlternateProviderConfig")
            .field("url", &self.url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl WeatherConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get_database_url(&var, "WEATHERVANE_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr, _>(&var, "WEATHERVANE_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16, _>(&var, "WEATHERVANE_PORT", "5000")?;

        let jwt_secret = get_validated_secret(&var, "JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "JWT_SECRET")?;

        let history_limit = parse_env_or_default::<i64, _>(&var, "HISTORY_LIMIT", "200")?;
        if history_limit < 1 {
            return Err(ConfigError::InvalidEnvVar(
                "HISTORY_LIMIT".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            host,
            port,
            cache: CacheConfig::from_vars(&var)?,
            upstream: UpstreamConfig::from_vars(&var)?,
            jwt_secret,
            history_limit,
            sentry_dsn: var("SENTRY_DSN"),
            sentry_environment: var("SENTRY_ENVIRONMENT"),
            sentry_traces_sample_rate: parse_env_or_default(
                &var,
                "SENTRY_TRACES_SAMPLE_RATE",
                "0.0",
            )?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CacheConfig {
    fn from_vars<F>(var: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ttl_minutes = parse_env_or_default::<u64, _>(var, "CACHE_TTL_MINUTES", "30")?;
        let digits = parse_env_or_default::<u32, _>(var, "COORDINATE_PRECISION", "3")?;

        let mut precision = CoordinatePrecision::new(digits).map_err(|e| {
            ConfigError::InvalidEnvVar("COORDINATE_PRECISION".to_string(), e.to_string())
        })?;

        if let Some(raw) = var("COORDINATE_EPSILON") {
            let epsilon = parse_value::<f64>("COORDINATE_EPSILON", &raw)?;
            precision = precision.with_epsilon(epsilon).map_err(|e| {
                ConfigError::InvalidEnvVar("COORDINATE_EPSILON".to_string(), e.to_string())
            })?;
        }

        Ok(Self {
            ttl: Duration::from_secs(ttl_minutes.saturating_mul(60)),
            precision,
        })
    }
}

impl UpstreamConfig {
    fn from_vars<F>(var: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs = parse_env_or_default::<u64, _>(var, "PROVIDER_TIMEOUT_SECS", "10")?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PROVIDER_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let alternate_enabled =
            parse_env_or_default::<bool, _>(var, "ALTERNATE_PROVIDER_ENABLED", "false")?;
        let alternate = if alternate_enabled {
            Some(AlternateProviderConfig {
                url: parse_env_or_default(var, "ALTERNATE_PROVIDER_URL", DEFAULT_ALTERNATE_URL)?,
                api_key: get_required_secret(var, "ALTERNATE_PROVIDER_API_KEY")?,
            })
        } else {
            None
        };

        Ok(Self {
            timeout: Duration::from_secs(timeout_secs),
            geocoding_url: parse_env_or_default(var, "GEOCODING_URL", DEFAULT_GEOCODING_URL)?,
            open_meteo_url: parse_env_or_default(var, "OPEN_METEO_URL", DEFAULT_OPEN_METEO_URL)?,
            alternate,
        })
    }
}

/// Read only the database URL, for tools that need nothing else.
///
/// Calls `dotenvy::dotenv()` to load from `.env` file if present.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    get_database_url(&|key: &str| std::env::var(key).ok(), "WEATHERVANE_DATABASE_URL")
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required variable.
fn get_required_env<F>(var: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required variable as a secret.
fn get_required_secret<F>(var: &F, key: &str) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = get_required_env(var, key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url<F>(var: &F, primary_key: &str) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(primary_key)
        .or_else(|| var("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Parse a variable, falling back to a default when unset.
fn parse_env_or_default<T, F>(var: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = var(key).unwrap_or_else(|| default.to_string());
    parse_value(key, &raw)
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret.
fn get_validated_secret<F>(var: &F, key: &str) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = get_required_env(var, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    const STRONG_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("WEATHERVANE_DATABASE_URL", "postgres://localhost/weathervane"),
            ("JWT_SECRET", STRONG_SECRET),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = WeatherConfig::from_vars(lookup(&minimal())).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.cache.ttl, Duration::from_secs(1800));
        assert_eq!(config.cache.precision.digits(), 3);
        assert_eq!(config.cache.precision.epsilon(), 0.0005);
        assert_eq!(config.upstream.timeout, Duration::from_secs(10));
        assert!(config.upstream.alternate.is_none());
        assert_eq!(config.history_limit, 200);
        assert_eq!(config.upstream.geocoding_url.as_str(), DEFAULT_GEOCODING_URL);
    }

    #[test]
    fn test_missing_jwt_secret() {
        let vars = lookup(&[("WEATHERVANE_DATABASE_URL", "postgres://localhost/w")]);
        let err = WeatherConfig::from_vars(vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "JWT_SECRET"));
    }

    #[test]
    fn test_database_url_fallback() {
        let vars = lookup(&[
            ("DATABASE_URL", "postgres://fallback/w"),
            ("JWT_SECRET", STRONG_SECRET),
        ]);
        let config = WeatherConfig::from_vars(vars).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fallback/w");
    }

    #[test]
    fn test_cache_overrides() {
        let mut pairs = minimal();
        pairs.push(("CACHE_TTL_MINUTES", "5"));
        pairs.push(("COORDINATE_PRECISION", "2"));
        pairs.push(("COORDINATE_EPSILON", "0.01"));
        let config = WeatherConfig::from_vars(lookup(&pairs)).unwrap();

        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.cache.precision.digits(), 2);
        assert_eq!(config.cache.precision.epsilon(), 0.01);
    }

    #[test]
    fn test_invalid_precision() {
        let mut pairs = minimal();
        pairs.push(("COORDINATE_PRECISION", "12"));
        let err = WeatherConfig::from_vars(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "COORDINATE_PRECISION"));
    }

    #[test]
    fn test_invalid_ttl() {
        let mut pairs = minimal();
        pairs.push(("CACHE_TTL_MINUTES", "half an hour"));
        let err = WeatherConfig::from_vars(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "CACHE_TTL_MINUTES"));
    }

    #[test]
    fn test_alternate_provider_requires_key() {
        let mut pairs = minimal();
        pairs.push(("ALTERNATE_PROVIDER_ENABLED", "true"));
        let err = WeatherConfig::from_vars(lookup(&pairs)).unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingEnvVar(key) if key == "ALTERNATE_PROVIDER_API_KEY")
        );
    }

    #[test]
    fn test_alternate_provider_enabled() {
        let mut pairs = minimal();
        pairs.push(("ALTERNATE_PROVIDER_ENABLED", "true"));
        pairs.push(("ALTERNATE_PROVIDER_API_KEY", "k3y"));
        pairs.push(("ALTERNATE_PROVIDER_URL", "http://127.0.0.1:9999/weather"));
        let config = WeatherConfig::from_vars(lookup(&pairs)).unwrap();

        let alternate = config.upstream.alternate.unwrap();
        assert_eq!(alternate.url.as_str(), "http://127.0.0.1:9999/weather");
        assert_eq!(alternate.api_key.expose_secret(), "k3y");
    }

    #[test]
    fn test_alternate_config_debug_redacts_key() {
        let alternate = AlternateProviderConfig {
            url: Url::parse(DEFAULT_ALTERNATE_URL).unwrap(),
            api_key: SecretString::from("super_private_key"),
        };
        let debug_output = format!("{alternate:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_private_key"));
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        // A well-known placeholder is rejected outright.
        let result = validate_secret_strength("supersecretkey", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"a".repeat(40), "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("aB3$xY9!"), "JWT_SECRET").is_err());
        assert!(validate_secret_length(&SecretString::from(STRONG_SECRET), "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let mut pairs = minimal();
        pairs.push(("WEATHERVANE_HOST", "0.0.0.0"));
        pairs.push(("WEATHERVANE_PORT", "8080"));
        let config = WeatherConfig::from_vars(lookup(&pairs)).unwrap();

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "0.0.0.0");
        assert_eq!(addr.port(), 8080);
    }
}
