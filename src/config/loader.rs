//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::{ApiKey, ProxyConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then the environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    let config = apply_env_overrides(config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables on top of file/default values.
///
/// `lookup` abstracts the environment so the overlay can be tested without
/// touching process state.
pub fn apply_env_overrides<F>(mut config: ProxyConfig, lookup: F) -> Result<ProxyConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(domain) = lookup("PRODUCTION_DOMAIN").filter(|v| !v.trim().is_empty()) {
        config.cors.production_domain = Some(domain);
    }
    if let Some(secret) = lookup("CLIENT_SECRET") {
        config.upstream.api_key = ApiKey::new(secret);
    }
    if let Some(addr) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(base) = lookup("UPSTREAM_BASE_URL") {
        config.upstream.base_url = base;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(v) = lookup("RATE_LIMIT_ENABLED") {
        config.rate_limit.enabled = parse_env("RATE_LIMIT_ENABLED", v)?;
    }
    if let Some(v) = lookup("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = parse_env("RATE_LIMIT_WINDOW_SECS", v)?;
    }
    if let Some(v) = lookup("RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.max_requests = parse_env("RATE_LIMIT_MAX_REQUESTS", v)?;
    }

    Ok(config)
}

fn parse_env<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
