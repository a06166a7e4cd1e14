//! Cross-origin policy.
//!
//! # Responsibilities
//! - Decide whether a declared `Origin` is allowed (localhost or the production host)
//! - Build the `CorsLayer` that emits `Access-Control-Allow-*` for allowed origins
//! - Reject requests from disallowed origins before they reach the rate limiter
//!
//! # Design Decisions
//! - Only the host is compared; scheme and port are ignored
//! - Malformed origins fail closed
//! - Requests without an `Origin` header are not cross-origin and pass

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use url::Url;

use crate::config::CorsConfig;
use crate::observability::metrics;

const LOCALHOST: &str = "localhost";

/// The set of hosts allowed to call the proxy from a browser.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    production_host: Option<String>,
}

impl OriginPolicy {
    /// Build the policy from configuration.
    ///
    /// An unparsable production domain leaves only `localhost` allowed;
    /// config validation rejects that case before startup.
    pub fn from_config(config: &CorsConfig) -> Self {
        let production_host = config
            .production_domain
            .as_deref()
            .and_then(host_of);

        match (&config.production_domain, &production_host) {
            (None, _) => tracing::warn!("No production domain configured, only localhost origins are allowed"),
            (Some(domain), None) => tracing::warn!(domain = %domain, "Production domain has no host, ignoring it"),
            (Some(_), Some(host)) => tracing::info!(production_host = %host, "CORS policy ready"),
        }

        Self { production_host }
    }

    /// Returns true if the origin's host is localhost or the production host.
    pub fn is_allowed(&self, origin: &str) -> bool {
        match host_of(origin) {
            Some(host) => {
                host == LOCALHOST || self.production_host.as_deref() == Some(host.as_str())
            }
            None => false,
        }
    }

    /// Header-value variant used by the CORS layer. Non-UTF-8 values are denied.
    pub fn is_allowed_header(&self, origin: &HeaderValue) -> bool {
        origin
            .to_str()
            .map(|o| self.is_allowed(o))
            .unwrap_or(false)
    }

    /// The `CorsLayer` granting any method and header to allowed origins.
    pub fn layer(self: &Arc<Self>) -> CorsLayer {
        let policy = Arc::clone(self);
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(move |origin, _parts| {
                policy.is_allowed_header(origin)
            }))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Lowercased host of an origin string, or `None` if it does not parse.
fn host_of(origin: &str) -> Option<String> {
    let url = Url::parse(origin.trim()).ok()?;
    url.host_str().map(|h| h.to_ascii_lowercase())
}

/// Middleware rejecting requests whose `Origin` header is present but not allowed.
pub async fn origin_guard_middleware(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(origin) = request.headers().get(header::ORIGIN) else {
        return next.run(request).await;
    };

    if policy.is_allowed_header(origin) {
        return next.run(request).await;
    }

    tracing::warn!(
        origin = ?origin,
        path = %request.uri().path(),
        "Origin not allowed"
    );
    metrics::record_cors_rejected();
    (StatusCode::FORBIDDEN, "Origin not allowed").into_response()
}
