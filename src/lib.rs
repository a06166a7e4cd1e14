//! RAWG API proxy library.
//!
//! Forwards game, genre, publisher, platform and tag lookups to the RAWG API,
//! injecting the server-held API key, behind a CORS origin check and per-IP
//! rate limiting.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
