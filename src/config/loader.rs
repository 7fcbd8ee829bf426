//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: `{value}`")]
    Env { var: &'static str, value: String },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `PROXY_*` overrides using the given variable lookup.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(origin) = lookup("PROXY_UPSTREAM_ORIGIN") {
        config.upstream.origin = origin;
    }
    if let Some(origin) = lookup("PROXY_PUBLIC_ORIGIN") {
        config.listener.public_origin = origin;
    }
    if let Some(addr) = lookup("PROXY_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }

    let host = lookup("PROXY_HOST");
    let port = lookup("PROXY_PORT");
    if host.is_some() || port.is_some() {
        let (cur_host, cur_port) = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(h, p)| (h.to_string(), p.to_string()))
            .unwrap_or_else(|| (config.listener.bind_address.clone(), "8080".to_string()));
        if let Some(ref p) = port {
            parse_num::<u16>("PROXY_PORT", p)?;
        }
        config.listener.bind_address = format!(
            "{}:{}",
            host.unwrap_or(cur_host),
            port.unwrap_or(cur_port)
        );
    }

    if let Some(v) = lookup("PROXY_CACHE_TTL_SECS") {
        config.cache.ttl_secs = parse_num("PROXY_CACHE_TTL_SECS", &v)?;
    }
    if let Some(v) = lookup("PROXY_RETRY_ATTEMPTS") {
        config.retries.max_attempts = parse_num("PROXY_RETRY_ATTEMPTS", &v)?;
    }
    if let Some(v) = lookup("PROXY_RETRY_BACKOFF_MS") {
        config.retries.backoff_ms = parse_num("PROXY_RETRY_BACKOFF_MS", &v)?;
    }
    if let Some(level) = lookup("PROXY_LOG_LEVEL") {
        config.observability.log_level = level;
    }

    Ok(())
}

fn parse_num<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}
