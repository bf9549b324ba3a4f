//! Weathervane weather resolution service.
//!
//! Resolves a place name or a coordinate pair into current weather data,
//! serving recent results from a coordinate-tolerant snapshot cache and
//! falling through an ordered list of providers on a miss. Every lookup is
//! recorded in the search history, attributed to the requester when a
//! verified bearer token accompanies it.
//!
//! # Architecture
//!
//! - [`resolver::WeatherResolver`] orchestrates one request end to end
//! - [`geocoding`] turns place names into coordinates
//! - [`store::SnapshotStore`] is the two-phase (exact, then range) cache
//! - [`providers::ProviderChain`] tries weather providers in order
//! - [`attribution::AttributionExtractor`] verifies bearer tokens
//! - [`history::HistoryRecorder`] writes history off the request path
//!
//! The binary in `main.rs` wires these against `PostgreSQL`; tests wire them
//! against [`db::memory`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod attribution;
pub mod config;
pub mod db;
pub mod error;
pub mod geocoding;
pub mod history;
pub mod middleware;
pub mod providers;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod store;

pub use config::WeatherConfig;
pub use routes::router;
pub use state::AppState;
