//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request (after access gate)
//!     → routes.rs (static table: list / detail / sub-resource per resource)
//!     → dispatch.rs (URL builder → upstream client → relay)
//!     → JSON pass-through (200) or failure description (400)
//! ```
//!
//! # Design Decisions
//! - Routes are static; there is no runtime route configuration
//! - Payloads are opaque JSON, never deserialized into domain types

pub mod dispatch;
pub mod routes;

use axum::Router;

use crate::http::server::AppState;

pub use dispatch::{Dispatcher, ListParams};
pub use routes::{RouteDescriptor, RouteKind, ROUTES};

/// Router with every proxied route registered.
pub fn router() -> Router<AppState> {
    ROUTES.iter().fold(Router::new(), |router, route| {
        router.route(&route.path(), dispatch::method_router(route))
    })
}
