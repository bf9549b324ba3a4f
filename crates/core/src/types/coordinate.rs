//! Geographic coordinates and the rounding policy applied to them.
//!
//! Every coordinate used as a cache key or persisted is first normalized by a
//! [`CoordinatePrecision`]. The precision also carries the tolerance used for
//! range-based matching of snapshots written under a different rounding policy.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Valid latitude range in degrees.
pub const LATITUDE_RANGE: core::ops::RangeInclusive<f64> = -90.0..=90.0;

/// Valid longitude range in degrees.
pub const LONGITUDE_RANGE: core::ops::RangeInclusive<f64> = -180.0..=180.0;

/// Errors that can occur when building a [`Coordinate`] or a [`CoordinatePrecision`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    /// Latitude is not a finite number.
    #[error("Latitude must be a number")]
    LatitudeNotFinite,
    /// Latitude is outside -90..=90.
    #[error("Latitude must be between -90 and 90")]
    LatitudeOutOfRange,
    /// Longitude is not a finite number.
    #[error("Longitude must be a number")]
    LongitudeNotFinite,
    /// Longitude is outside -180..=180.
    #[error("Longitude must be between -180 and 180")]
    LongitudeOutOfRange,
    /// Requested rounding precision is not supported.
    #[error("precision must be at most {max} decimal digits (got {got})")]
    PrecisionTooLarge {
        /// Maximum supported digits.
        max: u32,
        /// Requested digits.
        got: u32,
    },
    /// Tolerance is negative or not finite.
    #[error("epsilon must be a finite, non-negative number (got {0})")]
    InvalidEpsilon(f64),
}

/// A latitude/longitude pair in degrees.
///
/// Construction through [`Coordinate::new`] guarantees both components are
/// finite and within their valid ranges. Deserialization goes through the
/// same checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    /// Create a coordinate, validating both components.
    ///
    /// # Errors
    ///
    /// Returns the first failing component check.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        validate_latitude(latitude)?;
        validate_longitude(longitude)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Check a latitude value.
///
/// # Errors
///
/// Returns an error if the value is not finite or outside -90..=90.
pub fn validate_latitude(value: f64) -> Result<(), CoordinateError> {
    if !value.is_finite() {
        return Err(CoordinateError::LatitudeNotFinite);
    }
    if !LATITUDE_RANGE.contains(&value) {
        return Err(CoordinateError::LatitudeOutOfRange);
    }
    Ok(())
}

/// Check a longitude value.
///
/// # Errors
///
/// Returns an error if the value is not finite or outside -180..=180.
pub fn validate_longitude(value: f64) -> Result<(), CoordinateError> {
    if !value.is_finite() {
        return Err(CoordinateError::LongitudeNotFinite);
    }
    if !LONGITUDE_RANGE.contains(&value) {
        return Err(CoordinateError::LongitudeOutOfRange);
    }
    Ok(())
}

/// Rounding policy for coordinates.
///
/// ## Examples
///
/// ```
/// use weathervane_core::{Coordinate, CoordinatePrecision};
///
/// let precision = CoordinatePrecision::new(3).unwrap();
/// let raw = Coordinate::new(51.507_35, -0.127_76).unwrap();
/// let rounded = precision.normalize(raw);
///
/// assert_eq!(rounded.latitude(), 51.507);
/// assert_eq!(rounded.longitude(), -0.128);
/// assert_eq!(precision.epsilon(), 0.0005);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatePrecision {
    digits: u32,
    epsilon: f64,
}

impl CoordinatePrecision {
    /// Maximum supported decimal digits (roughly 1 cm at the equator).
    pub const MAX_DIGITS: u32 = 7;

    /// Create a precision with the default epsilon: half of one unit in the
    /// last retained decimal place.
    ///
    /// # Errors
    ///
    /// Returns an error if `digits` exceeds [`Self::MAX_DIGITS`].
    pub fn new(digits: u32) -> Result<Self, CoordinateError> {
        if digits > Self::MAX_DIGITS {
            return Err(CoordinateError::PrecisionTooLarge {
                max: Self::MAX_DIGITS,
                got: digits,
            });
        }
        Ok(Self {
            digits,
            epsilon: Self::default_epsilon(digits),
        })
    }

    /// Replace the range-match tolerance.
    ///
    /// # Errors
    ///
    /// Returns an error if `epsilon` is negative or not finite.
    pub fn with_epsilon(self, epsilon: f64) -> Result<Self, CoordinateError> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(CoordinateError::InvalidEpsilon(epsilon));
        }
        Ok(Self { epsilon, ..self })
    }

    /// Half of one unit at the given precision (`0.0005` for 3 digits).
    #[must_use]
    pub fn default_epsilon(digits: u32) -> f64 {
        0.5 / Self::factor_for(digits)
    }

    /// Number of decimal digits retained.
    #[must_use]
    pub const fn digits(&self) -> u32 {
        self.digits
    }

    /// Tolerance for range-based matching.
    #[must_use]
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Round a single value to the configured number of decimal digits.
    #[must_use]
    pub fn round(&self, value: f64) -> f64 {
        let factor = Self::factor_for(self.digits);
        (value * factor).round() / factor
    }

    /// Round both components of a coordinate.
    ///
    /// Rounding is idempotent, so normalizing an already normalized
    /// coordinate returns it unchanged.
    #[must_use]
    pub fn normalize(&self, coordinate: Coordinate) -> Coordinate {
        // Rounding a valid coordinate cannot leave the valid range because
        // the range bounds are integers.
        Coordinate {
            latitude: self.round(coordinate.latitude),
            longitude: self.round(coordinate.longitude),
        }
    }

    /// The inclusive tolerance box around a normalized coordinate.
    #[must_use]
    pub fn range_around(&self, coordinate: Coordinate) -> CoordinateRange {
        let center = self.normalize(coordinate);
        CoordinateRange {
            min_latitude: center.latitude - self.epsilon,
            max_latitude: center.latitude + self.epsilon,
            min_longitude: center.longitude - self.epsilon,
            max_longitude: center.longitude + self.epsilon,
        }
    }

    fn factor_for(digits: u32) -> f64 {
        // digits <= MAX_DIGITS, so the exponent always fits in i32
        10_f64.powi(i32::try_from(digits).unwrap_or(i32::MAX))
    }
}

impl Default for CoordinatePrecision {
    fn default() -> Self {
        Self {
            digits: 3,
            epsilon: Self::default_epsilon(3),
        }
    }
}

/// Inclusive latitude/longitude bounds used for range-fallback lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateRange {
    /// Lower latitude bound.
    pub min_latitude: f64,
    /// Upper latitude bound.
    pub max_latitude: f64,
    /// Lower longitude bound.
    pub min_longitude: f64,
    /// Upper longitude bound.
    pub max_longitude: f64,
}

impl CoordinateRange {
    /// Whether a coordinate falls inside the box (bounds inclusive).
    #[must_use]
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&coordinate.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&coordinate.longitude)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_validates_range() {
        let ok: Coordinate =
            serde_json::from_str(r#"{"latitude": 51.5, "longitude": -0.1}"#).unwrap();
        assert_eq!(ok, Coordinate::new(51.5, -0.1).unwrap());

        let err = serde_json::from_str::<Coordinate>(r#"{"latitude": 200.0, "longitude": 0.0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Latitude must be between -90 and 90"));
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert_eq!(
            Coordinate::new(200.0, 0.0),
            Err(CoordinateError::LatitudeOutOfRange)
        );
        assert_eq!(
            Coordinate::new(0.0, -180.5),
            Err(CoordinateError::LongitudeOutOfRange)
        );
        assert_eq!(
            Coordinate::new(f64::NAN, 0.0),
            Err(CoordinateError::LatitudeNotFinite)
        );
        assert_eq!(
            Coordinate::new(0.0, f64::INFINITY),
            Err(CoordinateError::LongitudeNotFinite)
        );
    }

    #[test]
    fn test_new_accepts_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_round_three_digits() {
        let precision = CoordinatePrecision::new(3).unwrap();
        assert_eq!(precision.round(10.0003), 10.0);
        assert_eq!(precision.round(20.0002), 20.0);
        assert_eq!(precision.round(10.0016), 10.002);
        assert_eq!(precision.round(-0.127_76), -0.128);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let precision = CoordinatePrecision::default();
        let once = precision.normalize(Coordinate::new(52.520_008, 13.404_954).unwrap());
        let twice = precision.normalize(once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_default_epsilon_is_half_unit() {
        assert_eq!(CoordinatePrecision::default_epsilon(3), 0.0005);
        assert_eq!(CoordinatePrecision::default_epsilon(0), 0.5);
        assert_eq!(CoordinatePrecision::default().epsilon(), 0.0005);
    }

    #[test]
    fn test_precision_too_large() {
        assert!(matches!(
            CoordinatePrecision::new(9),
            Err(CoordinateError::PrecisionTooLarge { max: 7, got: 9 })
        ));
    }

    #[test]
    fn test_with_epsilon_validation() {
        let precision = CoordinatePrecision::default();
        assert!(precision.with_epsilon(-0.1).is_err());
        assert!(precision.with_epsilon(f64::NAN).is_err());
        assert_eq!(precision.with_epsilon(0.01).unwrap().epsilon(), 0.01);
    }

    #[test]
    fn test_range_around_contains_drifted_coordinate() {
        let precision = CoordinatePrecision::default();
        let range = precision.range_around(Coordinate::new(10.0, 20.0).unwrap());

        assert!(range.contains(&Coordinate::new(10.0003, 20.0002).unwrap()));
        assert!(range.contains(&Coordinate::new(9.9996, 19.9999).unwrap()));
        assert!(!range.contains(&Coordinate::new(10.002, 20.0).unwrap()));
        assert!(!range.contains(&Coordinate::new(10.0, 20.001).unwrap()));
    }
}
