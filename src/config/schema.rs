//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the session proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, public origin, TLS).
    pub listener: ListenerConfig,

    /// Target application and outbound request shaping.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration for upstream fetches.
    pub retries: RetryConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Client marker cookie and guest account.
    pub session: SessionConfig,

    /// Response body rewriting.
    pub rewrite: RewriteConfig,

    /// Static mounts, stubs and the control sub-path.
    pub routes: RoutesConfig,

    /// Upstream accounts available to clients.
    pub accounts: Vec<AccountConfig>,

    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Origin clients use to reach the proxy. Upstream origins are rewritten to this.
    pub public_origin: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            public_origin: "http://localhost:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Upstream target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base origin of the fronted application (e.g., "https://app.example.com").
    pub origin: String,

    /// Well-known API prefix; duplicated occurrences are collapsed.
    pub api_prefix: String,

    /// Path prefixes whose responses must never be served from an upstream cache.
    pub volatile_prefixes: Vec<String>,

    /// Path prefixes served by other origins.
    pub host_routes: Vec<HostRouteConfig>,

    /// Headers added to every upstream request.
    pub extra_headers: BTreeMap<String, String>,

    /// Cookie fields stripped from session tokens before they are sent.
    pub blocked_cookie_fields: Vec<String>,

    /// Honor HTTP(S)_PROXY environment variables for outbound requests.
    pub use_system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        let mut extra_headers = BTreeMap::new();
        extra_headers.insert("accept".to_string(), "*/*".to_string());

        Self {
            origin: "https://www.example.com".to_string(),
            api_prefix: "/api/".to_string(),
            volatile_prefixes: vec!["/api/".to_string()],
            host_routes: Vec::new(),
            extra_headers,
            blocked_cookie_fields: vec![
                "__cf_bm".to_string(),
                "_cfuvid".to_string(),
                "_dd_s".to_string(),
            ],
            use_system_proxy: false,
        }
    }
}

/// A path prefix served by an alternate origin.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostRouteConfig {
    /// Path prefix to match (e.g., "/css2").
    pub prefix: String,

    /// Origin to forward to (e.g., "https://fonts.googleapis.com").
    pub origin: String,

    /// Send the account's session token to this origin.
    #[serde(default)]
    pub attach_credentials: bool,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for a single upstream attempt in seconds.
    pub attempt_secs: u64,

    /// Client-facing request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            attempt_secs: 30,
            request_secs: 90,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per upstream fetch, including the first.
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_ms: 1000,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,

    /// Interval between expired-entry sweeps in seconds (0 disables the sweeper).
    pub sweep_interval_secs: u64,

    /// Paths re-fetched by the force-refresh operation.
    pub refresh_paths: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            sweep_interval_secs: 600,
            refresh_paths: vec!["/".to_string()],
        }
    }
}

/// Client session marker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie carrying the selected account id.
    pub cookie_name: String,

    /// Account used when a request carries no marker.
    pub guest_account: String,

    /// Lifetime of the marker cookie in days.
    pub retention_days: i64,

    /// Mark the cookie `Secure`.
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "proxy_account".to_string(),
            guest_account: "guest".to_string(),
            retention_days: 30,
            secure_cookie: false,
        }
    }
}

/// Body rewriting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Additional upstream origins rewritten to the public origin.
    pub extra_origins: Vec<String>,

    /// Inject the request-interception script into HTML documents.
    pub inject_shim: bool,

    /// Remove Content-Security-Policy meta tags from HTML documents.
    pub strip_csp: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            extra_origins: Vec::new(),
            inject_shim: true,
            strip_csp: true,
        }
    }
}

/// Locally handled routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Sub-path exposing the account and cache control API.
    pub control_prefix: String,

    /// Prefixes served from local directories.
    pub static_mounts: Vec<StaticMountConfig>,

    /// Paths answered with a fixed body.
    pub stubs: Vec<StubConfig>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            control_prefix: "/__proxy".to_string(),
            static_mounts: Vec::new(),
            stubs: Vec::new(),
        }
    }
}

/// A path prefix served from a local directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticMountConfig {
    pub prefix: String,
    pub dir: String,
}

/// A path answered locally with a fixed body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StubConfig {
    /// Exact path to match.
    pub path: String,

    #[serde(default = "default_stub_content_type")]
    pub content_type: String,

    #[serde(default)]
    pub body: String,
}

fn default_stub_content_type() -> String {
    "application/javascript".to_string()
}

/// One upstream account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    /// Stable identifier used as the client marker value.
    pub id: String,

    /// Human-readable label.
    pub name: String,

    /// Inline session cookie material.
    #[serde(default)]
    pub cookie: Option<String>,

    /// Path to a captured credential file.
    #[serde(default)]
    pub credential_file: Option<String>,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub sec_ch_ua: Option<String>,
}

/// Cross-origin access configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to call the proxy with credentials. Empty disables CORS.
    pub allowed_origins: Vec<String>,

    /// Request headers accepted on preflight.
    pub allowed_headers: Vec<String>,

    /// How long browsers may cache a preflight answer, in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_headers: [
                "content-type",
                "authorization",
                "x-requested-with",
                "accept",
                "origin",
                "cookie",
                "x-csrf-protection",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
            max_age_secs: 86400,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
