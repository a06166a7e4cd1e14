//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use rawg_proxy::config::{ApiKey, ProxyConfig};
use rawg_proxy::{HttpServer, Shutdown};
use tokio::net::TcpListener;

pub const SECRET: &str = "SECRET-KEY-123";
pub const GAME_42: &str = r#"{"id":42,"name":"X"}"#;
pub const SLOW_RESPONSE: Duration = Duration::from_secs(3);
pub const SCREENSHOTS_42: &str = r#"{"count":1,"results":[{"id":7,"image":"https://media.example/7.jpg"}]}"#;

/// Upstream stand-in recording every request target it sees.
#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Path and query of every request received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a mock upstream with canned responses.
///
/// - `/api/games/42` and `/api/games/42/screenshots` return fixed bodies
/// - `/api/games/404` returns 404
/// - `/api/genres/500` returns 500
/// - `/api/tags/13` returns an HTML body
/// - `/api/games/999` answers after [`SLOW_RESPONSE`]
/// - anything else echoes `{"path": ...}`
pub async fn start_mock_upstream() -> MockUpstream {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .fallback(handle_upstream)
        .with_state(requests.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream { addr, requests }
}

async fn handle_upstream(State(requests): State<Arc<Mutex<Vec<String>>>>, uri: Uri) -> Response {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    requests.lock().unwrap().push(target);

    let json = |body: String| {
        (StatusCode::OK, [("content-type", "application/json")], body).into_response()
    };

    match uri.path() {
        "/api/games/42" => json(GAME_42.to_string()),
        "/api/games/42/screenshots" => json(SCREENSHOTS_42.to_string()),
        "/api/games/404" => (StatusCode::NOT_FOUND, r#"{"detail":"Not found."}"#).into_response(),
        "/api/genres/500" => (StatusCode::INTERNAL_SERVER_ERROR, "oops").into_response(),
        "/api/tags/13" => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        "/api/games/999" => {
            tokio::time::sleep(SLOW_RESPONSE).await;
            json(GAME_42.to_string())
        }
        path => json(serde_json::json!({ "path": path }).to_string()),
    }
}

/// Proxy config pointing at `upstream`, with a generous quota.
pub fn proxy_config(upstream_base: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.base_url = upstream_base.to_string();
    config.upstream.api_key = ApiKey::new(SECRET);
    config.upstream.system_proxy = false;
    config.cors.production_domain = Some("https://games.example.com".into());
    config.rate_limit.max_requests = 1_000;
    config
}

/// A proxy running on an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    RunningProxy { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
}
