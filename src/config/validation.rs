//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window within (0, 30 days], max requests > 0)
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// Upper bound for every duration setting, in seconds (30 days).
pub const MAX_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream.api_key is empty (set CLIENT_SECRET)")]
    MissingApiKey,

    #[error("upstream.base_url '{0}' is not an http(s) URL with a host")]
    InvalidBaseUrl(String),

    #[error("cors.production_domain '{0}' is not a URL with a host")]
    InvalidProductionDomain(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not exceed {max} seconds")]
    TooLarge { field: &'static str, max: u64 },

    #[error("rate_limit.real_ip_header '{0}' is not a valid header name")]
    InvalidHeaderName(String),

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("rate_limit.ip_whitelist entry '{0}' is not an IP address")]
    InvalidWhitelistEntry(String),
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.upstream.api_key.is_empty() {
        errors.push(ValidationError::MissingApiKey);
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
        _ => errors.push(ValidationError::InvalidBaseUrl(config.upstream.base_url.clone())),
    }

    if let Some(domain) = &config.cors.production_domain {
        let has_host = Url::parse(domain)
            .map(|u| u.host_str().is_some())
            .unwrap_or(false);
        if !has_host {
            errors.push(ValidationError::InvalidProductionDomain(domain.clone()));
        }
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        check_duration(&mut errors, "rate_limit.window_secs", rl.window_secs);
        if rl.max_requests == 0 {
            errors.push(ValidationError::Zero { field: "rate_limit.max_requests" });
        }
        check_duration(&mut errors, "rate_limit.sweep_interval_secs", rl.sweep_interval_secs);
    }
    for entry in &rl.ip_whitelist {
        if entry.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::InvalidWhitelistEntry(entry.clone()));
        }
    }
    if let Some(name) = &rl.real_ip_header {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(name.clone()));
        }
    }

    check_duration(&mut errors, "timeouts.request_secs", config.timeouts.request_secs);

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_duration(errors: &mut Vec<ValidationError>, field: &'static str, secs: u64) {
    if secs == 0 {
        errors.push(ValidationError::Zero { field });
    } else if secs > MAX_DURATION_SECS {
        errors.push(ValidationError::TooLarge {
            field,
            max: MAX_DURATION_SECS,
        });
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
