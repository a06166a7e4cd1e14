//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with every proxied route
//! - Wire up middleware (request ID, tracing, CORS, origin guard, rate limit)
//! - Bind server to listener
//! - Run the rate-limit sweeper alongside the server

use axum::{body::Body, middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::{request_span, UuidRequestId};
use crate::routing::{self, Dispatcher};
use crate::security::{origin_guard_middleware, rate_limit_middleware, OriginPolicy, RateLimiter};
use crate::upstream::{UpstreamClient, UrlBuilder};

/// Error building the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to build upstream HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the RAWG proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let client = UpstreamClient::from_config(&config.upstream)?;
        let urls = UrlBuilder::from_config(&config.upstream);
        let state = AppState {
            dispatcher: Arc::new(Dispatcher::new(
                urls,
                client,
                Duration::from_secs(config.timeouts.request_secs),
            )),
        };

        let origins = Arc::new(OriginPolicy::from_config(&config.cors));
        let limiter = Arc::new(RateLimiter::in_memory(&config.rate_limit));

        let router = Self::build_router(&config, state, origins, limiter.clone());
        Ok(Self {
            router,
            config,
            limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run outermost-first: request id, trace, CORS headers, origin
    /// guard, rate limit, then the route handler. The request deadline is
    /// enforced by the dispatcher so it surfaces as a 400 description.
    fn build_router(
        config: &ProxyConfig,
        state: AppState,
        origins: Arc<OriginPolicy>,
        limiter: Arc<RateLimiter>,
    ) -> Router {
        let mut router = routing::router().with_state(state);

        if config.rate_limit.enabled {
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        router
            .layer(middleware::from_fn_with_state(origins.clone(), origin_guard_middleware))
            .layer(origins.layer())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let sweeper = if self.config.rate_limit.enabled {
            Some(tokio::spawn(self.limiter.clone().run_sweeper(shutdown.resubscribe())))
        } else {
            None
        };

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        if let Some(sweeper) = sweeper {
            let _ = sweeper.await;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The assembled router, for driving the server without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKey;
    use axum::{
        extract::connect_info::MockConnectInfo,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        // Nothing listens on port 1, so upstream calls fail fast.
        config.upstream.base_url = "http://127.0.0.1:1/api".into();
        config.upstream.api_key = ApiKey::new("SECRET");
        config.upstream.system_proxy = false;
        config.cors.production_domain = Some("https://games.example.com".into());
        config.rate_limit.max_requests = 2;
        config
    }

    fn app(config: ProxyConfig) -> Router {
        HttpServer::new(config)
            .unwrap()
            .router()
            .layer(MockConnectInfo(SocketAddr::from(([198, 51, 100, 7], 5555))))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_disallowed_origin_is_forbidden() {
        let request = Request::builder()
            .uri("/games")
            .header(header::ORIGIN, "https://evil.example.com")
            .body(Body::empty())
            .unwrap();

        let response = app(config()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_request_without_key() {
        let response = app(config()).oneshot(get("/games/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let headers = format!("{:?}", response.headers());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(!text.contains("SECRET"), "{text}");
        assert!(!headers.contains("SECRET"));
        let description: String = serde_json::from_slice(&body).unwrap();
        assert!(!description.is_empty());
    }

    #[tokio::test]
    async fn test_quota_applies_per_peer() {
        let app = app(config());

        for _ in 0..2 {
            let response = app.clone().oneshot(get("/tags")).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert!(response.headers().contains_key("x-rate-limit-remaining"));
        }

        let response = app.clone().oneshot(get("/tags")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn test_disabled_rate_limit_never_rejects() {
        let mut config = config();
        config.rate_limit.enabled = false;
        let app = app(config);

        for _ in 0..5 {
            let response = app.clone().oneshot(get("/genres")).await.unwrap();
            assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            assert!(!response.headers().contains_key("x-rate-limit-remaining"));
        }
    }

    #[tokio::test]
    async fn test_non_integer_id_is_rejected_by_router() {
        let response = app(config()).oneshot(get("/games/abc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(serde_json::from_slice::<String>(&body).is_err(), "handler should not have run");
    }
}
