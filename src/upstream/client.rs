//! Outbound HTTP client for the upstream API.

use std::error::Error as _;

use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::upstream::url::UpstreamUrl;

const USER_AGENT_VALUE: &str = concat!("rawg-proxy/", env!("CARGO_PKG_VERSION"));

/// Failure talking to the upstream API.
///
/// Display strings are safe to return to callers: transport errors are
/// stripped of their URL before being stored.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(
        "Response status code does not indicate success: {} ({}).",
        .0.as_u16(),
        .0.canonical_reason().unwrap_or("Unknown")
    )]
    Status(StatusCode),

    #[error("{0}")]
    Transport(String),

    #[error("Upstream returned an invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Upstream did not respond within {0}s.")]
    DeadlineExceeded(u64),
}

impl UpstreamError {
    /// Wrap a reqwest error, dropping the URL and flattening the source chain.
    pub fn transport(err: reqwest::Error) -> Self {
        let err = err.without_url();
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        UpstreamError::Transport(message)
    }
}

/// Single-shot GET client. No retries; reqwest's default timeouts apply.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
}

impl UpstreamClient {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT_VALUE);
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        Ok(Self { http: builder.build()? })
    }

    /// GET `url` and return the body text of a 2xx response.
    pub async fn get_text(&self, url: &UpstreamUrl) -> Result<String, UpstreamError> {
        let response = self
            .http
            .get(url.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(UpstreamError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        response.text().await.map_err(UpstreamError::transport)
    }
}
