//! Core types for Weathervane.
//!
//! This module provides type-safe wrappers for the weather resolution domain.

pub mod coordinate;
pub mod history;
pub mod id;
pub mod provider;
pub mod query;
pub mod snapshot;

pub use coordinate::{Coordinate, CoordinateError, CoordinatePrecision, CoordinateRange};
pub use history::{Attribution, SearchHistoryEntry, SearchHistoryRecord, UserId};
pub use id::*;
pub use provider::{ProviderId, WeatherSource};
pub use query::{LocationQuery, NumericInput, QueryError};
pub use snapshot::{WeatherSnapshot, is_fresh};
