//! Outbound URL construction.
//!
//! URLs have the shape `{base}/{route}?token&key={secret}{suffix}`. The
//! caller-supplied suffix is re-encoded pair by pair, and any `key` or
//! `token` pair in it is dropped so the server credential cannot be
//! overridden from outside.

use std::fmt;

use url::form_urlencoded;

use crate::config::{ApiKey, UpstreamConfig};

/// A built upstream URL.
///
/// `Display` renders the redacted form; use [`UpstreamUrl::as_str`] only to
/// issue the request.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamUrl {
    url: String,
    redacted: String,
}

impl UpstreamUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn redacted(&self) -> &str {
        &self.redacted
    }
}

impl fmt::Display for UpstreamUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted)
    }
}

impl fmt::Debug for UpstreamUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UpstreamUrl").field(&self.redacted).finish()
    }
}

/// Builds outbound URLs against the configured base with the server-held key.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: String,
    api_key: ApiKey,
}

impl UrlBuilder {
    pub fn new(base: &str, api_key: ApiKey) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(&config.base_url, config.api_key.clone())
    }

    /// Build the URL for `route` (e.g. `games/42/screenshots`) with an optional
    /// raw query suffix such as `&genres=4&page=2`.
    pub fn build(&self, route: &str, query: Option<&str>) -> UpstreamUrl {
        let route = route.trim_matches('/');
        let suffix = query.map(sanitize_suffix).unwrap_or_default();
        let key: String = form_urlencoded::byte_serialize(self.api_key.expose().as_bytes()).collect();

        UpstreamUrl {
            url: format!("{}/{}?token&key={}{}", self.base, route, key, suffix),
            redacted: format!("{}/{}?token&key=***{}", self.base, route, suffix),
        }
    }
}

/// Re-encode a caller-supplied query suffix, dropping credential pairs.
fn sanitize_suffix(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches(['?', '&']);
    let mut serializer = form_urlencoded::Serializer::new(String::new());

    for (name, value) in form_urlencoded::parse(trimmed.as_bytes()) {
        if name.is_empty() || name.eq_ignore_ascii_case("key") || name.eq_ignore_ascii_case("token") {
            continue;
        }
        serializer.append_pair(&name, &value);
    }

    let encoded = serializer.finish();
    if encoded.is_empty() {
        encoded
    } else {
        format!("&{encoded}")
    }
}
