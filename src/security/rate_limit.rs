//! Per-IP fixed-window rate limiting.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

pub const X_RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-rate-limit-limit");
pub const X_RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-rate-limit-remaining");
pub const X_RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-rate-limit-reset");

/// Counter for one identity within one window.
#[derive(Debug, Clone, Copy)]
pub struct WindowCounter {
    pub count: u64,
    pub window_start: Instant,
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Time left until the current window ends.
    pub reset_after: Duration,
}

/// Storage for window counters.
///
/// `hit` must increment and compare atomically per key: two concurrent hits
/// for the same identity never observe the same count.
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `key` at `now`, returning the post-increment counter.
    fn hit(&self, key: &str, now: Instant, window: Duration) -> WindowCounter;

    /// Drop counters whose window ended before `now`. Returns how many were removed.
    fn sweep(&self, now: Instant, window: Duration) -> usize;

    fn len(&self) -> usize;
}

/// In-process counter table. The `DashMap` entry guard gives per-key exclusion.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    counters: DashMap<String, WindowCounter>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryStore {
    fn hit(&self, key: &str, now: Instant, window: Duration) -> WindowCounter {
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(WindowCounter { count: 0, window_start: now });

        if now.saturating_duration_since(entry.window_start) >= window {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count += 1;
        *entry
    }

    fn sweep(&self, now: Instant, window: Duration) -> usize {
        let before = self.counters.len();
        self.counters
            .retain(|_, c| now.saturating_duration_since(c.window_start) < window);
        before.saturating_sub(self.counters.len())
    }

    fn len(&self) -> usize {
        self.counters.len()
    }
}

/// Rate limiter combining a store with the configured quota.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    window: Duration,
    max_requests: u64,
    whitelist: HashSet<IpAddr>,
    real_ip_header: Option<HeaderName>,
    sweep_interval: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        let whitelist = config
            .ip_whitelist
            .iter()
            .filter_map(|ip| ip.parse().ok())
            .collect();
        let real_ip_header = config
            .real_ip_header
            .as_deref()
            .and_then(|h| HeaderName::from_bytes(h.as_bytes()).ok());

        Self {
            store,
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
            whitelist,
            real_ip_header,
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
        }
    }

    /// Limiter backed by a fresh in-memory store.
    pub fn in_memory(config: &RateLimitConfig) -> Self {
        Self::new(config, Arc::new(InMemoryStore::new()))
    }

    pub fn is_whitelisted(&self, ip: &IpAddr) -> bool {
        self.whitelist.contains(ip)
    }

    /// Count a request for `key` and decide whether it may proceed.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let counter = self.store.hit(key, now, self.window);
        let elapsed = now.saturating_duration_since(counter.window_start);

        RateLimitDecision {
            allowed: counter.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(counter.count),
            reset_after: self.window.saturating_sub(elapsed),
        }
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    /// Resolve the client identity: configured real-IP header first, then the peer address.
    ///
    /// The header must be written by a trusted reverse proxy. Only its last
    /// entry is used, since that is the one the nearest proxy appended;
    /// earlier entries come from the client and can be forged.
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
        let forwarded = self
            .real_ip_header
            .as_ref()
            .and_then(|name| headers.get(name))
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());

        forwarded.or_else(|| peer.map(|addr| addr.ip()))
    }

    /// Periodically drop expired counters until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.store.sweep(Instant::now(), self.window);
                    if removed > 0 {
                        tracing::debug!(removed, tracked = self.store.len(), "Swept expired rate limit counters");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper stopping");
                    return;
                }
            }
        }
    }

    fn quota_exceeded_message(&self) -> String {
        format!(
            "API calls quota exceeded! maximum admitted {} per {}s.",
            self.max_requests,
            self.window.as_secs()
        )
    }

    fn apply_headers(&self, headers: &mut HeaderMap, decision: &RateLimitDecision) {
        insert_header(headers, X_RATE_LIMIT_LIMIT, format!("{}s", self.window.as_secs()));
        insert_header(headers, X_RATE_LIMIT_REMAINING, decision.remaining.to_string());

        // Omitted when the reset instant is not representable.
        let reset_at = chrono::Duration::from_std(decision.reset_after)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta));
        if let Some(reset_at) = reset_at {
            insert_header(headers, X_RATE_LIMIT_RESET, reset_at.to_rfc3339());
        }
    }
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}

/// Middleware enforcing the per-IP quota.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = limiter.client_ip(request.headers(), peer);

    if let Some(ip) = ip {
        if limiter.is_whitelisted(&ip) {
            return next.run(request).await;
        }
    }

    let key = ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_string());
    let decision = limiter.check(&key);

    if decision.allowed {
        let mut response = next.run(request).await;
        limiter.apply_headers(response.headers_mut(), &decision);
        return response;
    }

    tracing::warn!(
        client = %key,
        limit = decision.limit,
        retry_after_secs = decision.reset_after.as_secs(),
        path = %request.uri().path(),
        "Rate limit exceeded"
    );
    metrics::record_rate_limited();

    let mut response = Response::new(Body::from(limiter.quota_exceeded_message()));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    limiter.apply_headers(response.headers_mut(), &decision);
    // Round up so clients never retry inside the current window.
    let retry_after = decision.reset_after.as_secs() + u64::from(decision.reset_after.subsec_nanos() > 0);
    insert_header(response.headers_mut(), header::RETRY_AFTER, retry_after.to_string());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_requests: u64, window_secs: u64) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            window_secs,
            ..RateLimitConfig::default()
        }
    }

    #[test]
    fn test_allows_up_to_max_then_rejects() {
        let limiter = RateLimiter::in_memory(&config(3, 60));
        let now = Instant::now();

        for expected_remaining in [2, 1, 0] {
            let d = limiter.check_at("10.0.0.1", now);
            assert!(d.allowed);
            assert_eq!(d.remaining, expected_remaining);
        }

        let d = limiter.check_at("10.0.0.1", now + Duration::from_secs(1));
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.reset_after, Duration::from_secs(59));
    }

    #[test]
    fn test_window_rollover_resets_quota() {
        let limiter = RateLimiter::in_memory(&config(1, 10));
        let start = Instant::now();

        assert!(limiter.check_at("ip", start).allowed);
        assert!(!limiter.check_at("ip", start + Duration::from_secs(9)).allowed);

        let d = limiter.check_at("ip", start + Duration::from_secs(10));
        assert!(d.allowed, "new window should have a fresh quota");
        assert_eq!(d.reset_after, Duration::from_secs(10));
    }

    #[test]
    fn test_identities_are_independent() {
        let limiter = RateLimiter::in_memory(&config(1, 60));
        let now = Instant::now();

        assert!(limiter.check_at("a", now).allowed);
        assert!(!limiter.check_at("a", now).allowed);
        assert!(limiter.check_at("b", now).allowed);
    }

    #[test]
    fn test_concurrent_hits_are_counted_exactly() {
        let store = Arc::new(InMemoryStore::new());
        let limiter = Arc::new(RateLimiter::new(&config(50, 60), store.clone()));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..25).filter(|_| limiter.check_at("shared", now).allowed).count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
        assert_eq!(store.hit("shared", now, Duration::from_secs(60)).count, 201);
    }

    #[test]
    fn test_sweep_drops_only_expired_counters() {
        let store = InMemoryStore::new();
        let window = Duration::from_secs(5);
        let start = Instant::now();

        store.hit("old", start, window);
        store.hit("fresh", start + Duration::from_secs(4), window);

        let removed = store.sweep(start + Duration::from_secs(6), window);
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_client_ip_prefers_configured_header() {
        let mut cfg = config(1, 60);
        cfg.real_ip_header = Some("X-Forwarded-For".into());
        let limiter = RateLimiter::in_memory(&cfg);
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(
            limiter.client_ip(&headers, Some(peer)),
            Some("203.0.113.7".parse().unwrap())
        );

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(limiter.client_ip(&headers, Some(peer)), Some(peer.ip()));
    }

    #[test]
    fn test_client_supplied_forwarded_entries_are_ignored() {
        let mut cfg = config(1, 60);
        cfg.real_ip_header = Some("X-Forwarded-For".into());
        let limiter = RateLimiter::in_memory(&cfg);
        let peer: SocketAddr = "10.0.0.2:4000".parse().unwrap();

        let mut first = HeaderMap::new();
        first.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1, 198.51.100.9"));
        let mut rotated = HeaderMap::new();
        rotated.insert("x-forwarded-for", HeaderValue::from_static("2.2.2.2, 198.51.100.9"));

        let a = limiter.client_ip(&first, Some(peer));
        assert_eq!(a, Some("198.51.100.9".parse().unwrap()));
        assert_eq!(limiter.client_ip(&rotated, Some(peer)), a);

        let key = a.unwrap().to_string();
        assert!(limiter.check(&key).allowed);
        assert!(!limiter.check(&key).allowed);
    }

    #[test]
    fn test_huge_window_does_not_panic_on_headers() {
        let limiter = RateLimiter::in_memory(&config(1, 9_000_000_000_000));
        let decision = limiter.check("10.0.0.3");

        let mut headers = HeaderMap::new();
        limiter.apply_headers(&mut headers, &decision);
        assert_eq!(headers[&X_RATE_LIMIT_REMAINING], "0");
        assert!(!headers.contains_key(&X_RATE_LIMIT_RESET));
    }

    #[test]
    fn test_reset_header_is_rfc3339() {
        let limiter = RateLimiter::in_memory(&config(5, 60));
        let decision = limiter.check("10.0.0.4");

        let mut headers = HeaderMap::new();
        limiter.apply_headers(&mut headers, &decision);
        let reset = headers[&X_RATE_LIMIT_RESET].to_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(reset).is_ok(), "{reset}");
    }

    #[test]
    fn test_forwarded_header_ignored_when_not_configured() {
        let limiter = RateLimiter::in_memory(&config(1, 60));
        let peer: SocketAddr = "192.0.2.1:1234".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));

        assert_eq!(limiter.client_ip(&headers, Some(peer)), Some(peer.ip()));
        assert_eq!(limiter.client_ip(&headers, None), None);
    }

    #[test]
    fn test_whitelist() {
        let mut cfg = config(1, 60);
        cfg.ip_whitelist = vec!["10.1.1.1".into()];
        let limiter = RateLimiter::in_memory(&cfg);

        assert!(limiter.is_whitelisted(&"10.1.1.1".parse().unwrap()));
        assert!(!limiter.is_whitelisted(&"10.1.1.2".parse().unwrap()));
    }
}
