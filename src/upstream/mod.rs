//! Upstream API access.
//!
//! # Data Flow
//! ```text
//! route + optional query suffix
//!     → url.rs (base + route + ?token&key=*** + sanitized suffix)
//!     → client.rs (single GET, 2xx check, body text)
//!     → back to the dispatcher
//! ```
//!
//! # Design Decisions
//! - No retries, no caching, no timeout override
//! - The API key only exists inside `UpstreamUrl::as_str`; every log and error
//!   path sees the redacted form

pub mod client;
pub mod url;

pub use self::client::{UpstreamClient, UpstreamError};
pub use self::url::{UpstreamUrl, UrlBuilder};
