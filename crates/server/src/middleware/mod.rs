//! HTTP middleware and extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (permissive; the service is called from browsers on other origins)

pub mod auth;
pub mod client_ip;
pub mod request_id;

pub use auth::{OptionalAttribution, RequireAttribution};
pub use client_ip::ClientIp;
pub use request_id::request_id_middleware;
