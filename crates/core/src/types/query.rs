//! Location queries: a place name, an explicit coordinate pair, or both.
//!
//! Raw request parameters arrive as loosely typed values (query strings carry
//! only text, JSON bodies may carry numbers or text). [`LocationQuery::parse`]
//! validates them all at once and reports every problem found, joined into a
//! single message.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::coordinate::{Coordinate, CoordinateError, validate_latitude, validate_longitude};

const MISSING_LOCATION: &str = "Provide either a city or a pair of latitude and longitude";
const INCOMPLETE_PAIR: &str = "Latitude and longitude must be provided together";
const EMPTY_CITY: &str = "City must not be empty";

/// A numeric request parameter before validation.
///
/// Deserializes from either a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    /// A value that already arrived as a number.
    Number(f64),
    /// A textual value that still needs parsing.
    Text(String),
}

impl NumericInput {
    /// Interpret the input as a finite number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for NumericInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Validation failure for a location query.
///
/// Carries every message found, in field order, followed by
/// cross-field messages.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .messages.join(", "))]
pub struct QueryError {
    messages: Vec<String>,
}

impl QueryError {
    /// Individual validation messages.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// A validated location query.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    /// Only a place name was supplied; it must be geocoded.
    Place(String),
    /// An explicit coordinate pair, optionally accompanied by a place name
    /// that is kept for attribution only.
    Coordinates {
        /// The supplied coordinate (not yet rounded).
        coordinate: Coordinate,
        /// Place name supplied alongside, if any.
        city: Option<String>,
    },
}

impl LocationQuery {
    /// Validate raw request parameters.
    ///
    /// Rules:
    /// - `city`, when present, is trimmed and must not be empty
    /// - `latitude`/`longitude` must be numbers within their valid ranges
    /// - latitude and longitude must be supplied together
    /// - at least a city or a coordinate pair must be supplied
    ///
    /// When both a city and a coordinate pair are supplied, the coordinates
    /// are used and the city is retained.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] listing every rule that failed.
    pub fn parse(
        city: Option<&str>,
        latitude: Option<&NumericInput>,
        longitude: Option<&NumericInput>,
    ) -> Result<Self, QueryError> {
        let mut messages = Vec::new();

        let city = city.map(str::trim).map(str::to_owned);
        if city.as_deref().is_some_and(str::is_empty) {
            messages.push(EMPTY_CITY.to_owned());
        }

        let lat = latitude.map(|raw| {
            parse_component(raw, validate_latitude, CoordinateError::LatitudeNotFinite)
        });
        let lon = longitude.map(|raw| {
            parse_component(raw, validate_longitude, CoordinateError::LongitudeNotFinite)
        });

        for component in [&lat, &lon].into_iter().flatten() {
            if let Err(e) = component {
                messages.push(e.to_string());
            }
        }

        // The location rule and the pair rule are independent; a lone
        // longitude breaks both.
        if city.is_none() && latitude.is_none() {
            messages.push(MISSING_LOCATION.to_owned());
        }
        if latitude.is_some() != longitude.is_some() {
            messages.push(INCOMPLETE_PAIR.to_owned());
        }

        if !messages.is_empty() {
            return Err(QueryError { messages });
        }

        match (lat, lon, city) {
            (Some(Ok(latitude)), Some(Ok(longitude)), city) => {
                let coordinate = Coordinate::new(latitude, longitude).map_err(|e| QueryError {
                    messages: vec![e.to_string()],
                })?;
                Ok(Self::Coordinates { coordinate, city })
            }
            (_, _, Some(city)) => Ok(Self::Place(city)),
            _ => Err(QueryError {
                messages: vec![MISSING_LOCATION.to_owned()],
            }),
        }
    }

    /// The place name carried by the query, if any.
    #[must_use]
    pub fn city(&self) -> Option<&str> {
        match self {
            Self::Place(city) => Some(city),
            Self::Coordinates { city, .. } => city.as_deref(),
        }
    }

    /// The explicit coordinate, if one was supplied.
    #[must_use]
    pub const fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::Place(_) => None,
            Self::Coordinates { coordinate, .. } => Some(*coordinate),
        }
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Place(city) => write!(f, "city={city}"),
            Self::Coordinates { coordinate, .. } => write!(f, "coordinates={coordinate}"),
        }
    }
}

fn parse_component(
    raw: &NumericInput,
    validate: fn(f64) -> Result<(), CoordinateError>,
    not_a_number: CoordinateError,
) -> Result<f64, CoordinateError> {
    let value = raw.as_f64().ok_or(not_a_number)?;
    validate(value)?;
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn num(v: f64) -> NumericInput {
        NumericInput::Number(v)
    }

    fn text(v: &str) -> NumericInput {
        NumericInput::Text(v.to_owned())
    }

    #[test]
    fn test_city_only() {
        let query = LocationQuery::parse(Some("  London "), None, None).unwrap();
        assert_eq!(query, LocationQuery::Place("London".to_owned()));
        assert_eq!(query.city(), Some("London"));
        assert!(query.coordinate().is_none());
    }

    #[test]
    fn test_coordinates_from_text() {
        let query = LocationQuery::parse(None, Some(&text("10.5")), Some(&text("-20.25"))).unwrap();
        let coordinate = query.coordinate().unwrap();
        assert_eq!(coordinate.latitude(), 10.5);
        assert_eq!(coordinate.longitude(), -20.25);
        assert!(query.city().is_none());
    }

    #[test]
    fn test_coordinates_win_over_city() {
        let query =
            LocationQuery::parse(Some("Paris"), Some(&num(48.85)), Some(&num(2.35))).unwrap();
        assert!(matches!(query, LocationQuery::Coordinates { .. }));
        assert_eq!(query.city(), Some("Paris"));
    }

    #[test]
    fn test_nothing_supplied() {
        let err = LocationQuery::parse(None, None, None).unwrap_err();
        assert_eq!(err.to_string(), MISSING_LOCATION);
    }

    #[test]
    fn test_latitude_without_longitude() {
        let err = LocationQuery::parse(None, Some(&num(10.0)), None).unwrap_err();
        assert_eq!(err.to_string(), INCOMPLETE_PAIR);
    }

    #[test]
    fn test_longitude_without_latitude() {
        let err = LocationQuery::parse(None, None, Some(&num(5.0))).unwrap_err();
        assert_eq!(err.messages(), [MISSING_LOCATION.to_owned(), INCOMPLETE_PAIR.to_owned()]);
        assert_eq!(
            err.to_string(),
            "Provide either a city or a pair of latitude and longitude, \
             Latitude and longitude must be provided together"
        );
    }

    #[test]
    fn test_city_with_lone_longitude() {
        let err = LocationQuery::parse(Some("Oslo"), None, Some(&num(10.7))).unwrap_err();
        assert_eq!(err.messages(), [INCOMPLETE_PAIR.to_owned()]);
    }

    #[test]
    fn test_latitude_out_of_range() {
        let err = LocationQuery::parse(None, Some(&num(200.0)), Some(&num(0.0))).unwrap_err();
        assert_eq!(err.to_string(), "Latitude must be between -90 and 90");
    }

    #[test]
    fn test_non_numeric_longitude() {
        let err = LocationQuery::parse(None, Some(&num(10.0)), Some(&text("east"))).unwrap_err();
        assert_eq!(err.to_string(), "Longitude must be a number");
    }

    #[test]
    fn test_nan_text_is_not_a_number() {
        let err = LocationQuery::parse(None, Some(&text("NaN")), Some(&num(0.0))).unwrap_err();
        assert_eq!(err.to_string(), "Latitude must be a number");
    }

    #[test]
    fn test_empty_city() {
        let err = LocationQuery::parse(Some("   "), None, None).unwrap_err();
        assert_eq!(err.messages(), [EMPTY_CITY.to_owned()]);
    }

    #[test]
    fn test_collects_all_messages() {
        let err = LocationQuery::parse(None, Some(&num(-91.0)), Some(&num(181.0))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Latitude must be between -90 and 90, Longitude must be between -180 and 180"
        );
    }

    #[test]
    fn test_numeric_input_deserializes_number_or_text() {
        let n: NumericInput = serde_json::from_str("12.5").unwrap();
        let t: NumericInput = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(n.as_f64(), Some(12.5));
        assert_eq!(t.as_f64(), Some(12.5));
    }
}
