//! Weathervane Core - Shared types library.
//!
//! This crate provides common types used across all Weathervane components:
//! - `server` - Weather resolution HTTP service
//! - `cli` - Command-line tools for migrations and snapshot retention
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Coordinates, location queries, snapshots, history entries and IDs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
