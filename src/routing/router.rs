//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled matchers
//! - Classify a request path before any session work happens
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan (acceptable for typical mount counts)
//! - Order: control API, static mounts (longest prefix first), stubs, API, everything else

use super::matcher::{ExactPathMatcher, Matcher, PathPrefixMatcher};
use crate::config::{ProxyConfig, StaticMountConfig, StubConfig};

/// Which branch of the request pipeline a path takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Account list, switch and refresh endpoints.
    Control,
    /// Served from a local directory; bypasses sessions and cache.
    Static(usize),
    /// Answered with a fixed body.
    Stub(usize),
    /// Forwarded upstream with any method.
    Api,
    /// Catch-all resource fetch (GET/HEAD only).
    Resource,
}

impl RouteKind {
    /// Low-cardinality label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Static(_) => "static",
            Self::Stub(_) => "stub",
            Self::Api => "api",
            Self::Resource => "resource",
        }
    }
}

#[derive(Debug)]
pub struct StaticMount {
    pub matcher: PathPrefixMatcher,
    pub config: StaticMountConfig,
}

#[derive(Debug)]
pub struct Stub {
    matcher: ExactPathMatcher,
    pub config: StubConfig,
}

/// Compiled path classification.
#[derive(Debug)]
pub struct RouteTable {
    control: PathPrefixMatcher,
    statics: Vec<StaticMount>,
    stubs: Vec<Stub>,
    api: PathPrefixMatcher,
}

impl RouteTable {
    pub fn from_config(config: &ProxyConfig) -> Self {
        let mut statics: Vec<StaticMount> = config
            .routes
            .static_mounts
            .iter()
            .map(|m| StaticMount {
                matcher: PathPrefixMatcher::new(m.prefix.trim_end_matches('/')),
                config: m.clone(),
            })
            .collect();
        statics.sort_by(|a, b| b.matcher.prefix().len().cmp(&a.matcher.prefix().len()));

        let stubs = config
            .routes
            .stubs
            .iter()
            .map(|s| Stub {
                matcher: ExactPathMatcher::new(s.path.clone()),
                config: s.clone(),
            })
            .collect();

        Self {
            control: PathPrefixMatcher::new(config.routes.control_prefix.trim_end_matches('/')),
            statics,
            stubs,
            api: PathPrefixMatcher::new(config.upstream.api_prefix.clone()),
        }
    }

    pub fn classify(&self, path: &str) -> RouteKind {
        if self.control.matches(path) {
            return RouteKind::Control;
        }
        if let Some(idx) = self.statics.iter().position(|m| m.matcher.matches(path)) {
            return RouteKind::Static(idx);
        }
        if let Some(idx) = self.stubs.iter().position(|s| s.matcher.matches(path)) {
            return RouteKind::Stub(idx);
        }
        if self.api.matches(path) {
            return RouteKind::Api;
        }
        RouteKind::Resource
    }

    /// Control endpoint name relative to the control prefix ("/accounts", ...).
    pub fn control_endpoint<'a>(&self, path: &'a str) -> Option<&'a str> {
        self.control.strip(path)
    }

    pub fn static_mount(&self, idx: usize) -> Option<&StaticMount> {
        self.statics.get(idx)
    }

    pub fn stub(&self, idx: usize) -> Option<&Stub> {
        self.stubs.get(idx)
    }
}
