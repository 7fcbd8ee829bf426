//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check origins parse and cannot contain each other
//! - Validate value ranges (timeouts > 0, attempts >= 1)
//! - Check account ids are unique and the guest account exists
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Normalize an origin string to `scheme://host[:port]`.
pub fn normalize_origin(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(url.origin().ascii_serialization())
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let public = check_origin(&mut errors, "listener.public_origin", &config.listener.public_origin);

    let mut upstream_origins = Vec::new();
    if let Some(o) = check_origin(&mut errors, "upstream.origin", &config.upstream.origin) {
        upstream_origins.push(o);
    }
    for (i, origin) in config.rewrite.extra_origins.iter().enumerate() {
        if let Some(o) = check_origin(&mut errors, format!("rewrite.extra_origins[{i}]"), origin) {
            upstream_origins.push(o);
        }
    }

    // Rewriting is only idempotent when neither side can match inside the other.
    if let Some(public) = &public {
        for origin in &upstream_origins {
            if public.contains(origin.as_str()) || origin.contains(public.as_str()) {
                errors.push(ValidationError::new(
                    "listener.public_origin",
                    format!("overlaps upstream origin {origin}"),
                ));
            }
        }
    }

    check_prefix(&mut errors, "upstream.api_prefix", &config.upstream.api_prefix);
    for (i, prefix) in config.upstream.volatile_prefixes.iter().enumerate() {
        check_prefix(&mut errors, format!("upstream.volatile_prefixes[{i}]"), prefix);
    }
    for (i, route) in config.upstream.host_routes.iter().enumerate() {
        check_prefix(&mut errors, format!("upstream.host_routes[{i}].prefix"), &route.prefix);
        check_origin(&mut errors, format!("upstream.host_routes[{i}].origin"), &route.origin);
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.timeouts.attempt_secs == 0 {
        errors.push(ValidationError::new("timeouts.attempt_secs", "must be greater than 0"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError::new("cache.ttl_secs", "must be greater than 0"));
    }
    for (i, path) in config.cache.refresh_paths.iter().enumerate() {
        check_prefix(&mut errors, format!("cache.refresh_paths[{i}]"), path);
    }

    if config.session.cookie_name.trim().is_empty() {
        errors.push(ValidationError::new("session.cookie_name", "must not be empty"));
    }
    if config.session.retention_days <= 0 {
        errors.push(ValidationError::new("session.retention_days", "must be greater than 0"));
    }

    check_prefix(&mut errors, "routes.control_prefix", &config.routes.control_prefix);
    if config.routes.control_prefix == "/" {
        errors.push(ValidationError::new("routes.control_prefix", "must not be `/`"));
    }
    for (i, mount) in config.routes.static_mounts.iter().enumerate() {
        let field = format!("routes.static_mounts[{i}].prefix");
        check_prefix(&mut errors, field.clone(), &mount.prefix);
        if mount.prefix == "/" {
            errors.push(ValidationError::new(field, "must not be `/`"));
        }
    }
    for (i, stub) in config.routes.stubs.iter().enumerate() {
        check_prefix(&mut errors, format!("routes.stubs[{i}].path"), &stub.path);
    }

    let mut seen = HashSet::new();
    for (i, account) in config.accounts.iter().enumerate() {
        if account.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("accounts[{i}].id"), "must not be empty"));
        } else if !seen.insert(account.id.as_str()) {
            errors.push(ValidationError::new(
                format!("accounts[{i}].id"),
                format!("duplicate account `{}`", account.id),
            ));
        }
        if account.cookie.is_some() == account.credential_file.is_some() {
            errors.push(ValidationError::new(
                format!("accounts[{i}]"),
                "needs exactly one of `cookie` or `credential_file`",
            ));
        }
    }
    if !seen.contains(config.session.guest_account.as_str()) {
        errors.push(ValidationError::new(
            "session.guest_account",
            format!("account `{}` is not configured", config.session.guest_account),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_origin(
    errors: &mut Vec<ValidationError>,
    field: impl Into<String>,
    raw: &str,
) -> Option<String> {
    let normalized = normalize_origin(raw);
    if normalized.is_none() {
        errors.push(ValidationError::new(field, format!("`{raw}` is not an http(s) origin")));
    }
    normalized
}

fn check_prefix(errors: &mut Vec<ValidationError>, field: impl Into<String>, prefix: &str) {
    if !prefix.starts_with('/') {
        errors.push(ValidationError::new(field, format!("`{prefix}` must start with `/`")));
    }
}
