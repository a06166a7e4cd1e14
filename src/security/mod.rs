//! Access gate.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (CorsLayer: preflight + Access-Control-Allow-* for allowed origins)
//!     → cors.rs (origin guard: 403 for disallowed or malformed Origin)
//!     → rate_limit.rs (per-IP fixed window: 429 when over quota)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Both checks run before any upstream I/O
//! - The counter table is the only mutable state, owned by the limiter

pub mod cors;
pub mod rate_limit;

pub use cors::{origin_guard_middleware, OriginPolicy};
pub use rate_limit::{
    rate_limit_middleware, InMemoryStore, RateLimitDecision, RateLimitStore, RateLimiter,
    WindowCounter,
};
