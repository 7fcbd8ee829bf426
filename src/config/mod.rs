//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (PROXY_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AccountConfig, CacheConfig, CorsConfig, HostRouteConfig, ListenerConfig, ObservabilityConfig,
    ProxyConfig, RetryConfig, RewriteConfig, RoutesConfig, SecurityConfig, SessionConfig,
    StaticMountConfig, StubConfig, TimeoutConfig, TlsConfig, UpstreamConfig,
};
pub use validation::{normalize_origin, ValidationError};
