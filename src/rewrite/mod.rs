//! Response body rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream body + content type
//!     → ContentKind (html | script | other)
//!     html:   origins.rs (literal + JSON-escaped origin substitution)
//!             → html.rs (strip CSP meta, inject interception shim once)
//!     script: origins.rs
//!     other:  unchanged
//!     → rewritten body (what the cache stores)
//! ```
//!
//! # Design Decisions
//! - Substitution is literal, not a parser; the shim catches runtime-built URLs
//! - Every transform is idempotent: the public origin never contains an
//!   upstream origin, the shim never spells out an upstream origin, and
//!   injection is skipped when the shim marker is already present
//! - Non-UTF-8 text bodies fail with `RewriteError`; callers serve them unmodified

pub mod html;
pub mod origins;

pub use origins::OriginMap;

use bytes::Bytes;
use thiserror::Error;

use crate::config::ProxyConfig;
use html::HtmlRewriter;
use origins::OriginSubstitution;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("body is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// How a body is treated, decided by its declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    /// Scripts and other text formats that embed absolute URLs.
    Script,
    Other,
}

impl ContentKind {
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "text/html" | "application/xhtml+xml" => Self::Html,
            "application/javascript"
            | "text/javascript"
            | "application/x-javascript"
            | "application/ecmascript"
            | "text/ecmascript"
            | "application/json"
            | "text/css" => Self::Script,
            other if other.ends_with("+json") => Self::Script,
            _ => Self::Other,
        }
    }
}

/// Process-wide rule set applied to every cacheable body.
#[derive(Debug, Clone)]
pub struct Rewriter {
    substitution: OriginSubstitution,
    html: HtmlRewriter,
}

impl Rewriter {
    pub fn new(origins: OriginMap, inject_shim: bool, strip_csp: bool) -> Result<Self, RewriteError> {
        let html = HtmlRewriter::new(&origins, inject_shim, strip_csp)?;
        let substitution = OriginSubstitution::new(origins)?;
        Ok(Self { substitution, html })
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, RewriteError> {
        Self::new(
            OriginMap::from_config(config),
            config.rewrite.inject_shim,
            config.rewrite.strip_csp,
        )
    }

    /// Rewrite `body` according to `content_type`.
    pub fn rewrite(&self, body: &Bytes, content_type: &str) -> Result<Bytes, RewriteError> {
        let kind = ContentKind::from_content_type(content_type);
        if kind == ContentKind::Other {
            return Ok(body.clone());
        }

        let text = std::str::from_utf8(body)?;
        let substituted = self.substitution.apply(text);
        let out = match kind {
            ContentKind::Html => self.html.apply(&substituted).into_owned(),
            _ => substituted.into_owned(),
        };
        Ok(Bytes::from(out))
    }
}
