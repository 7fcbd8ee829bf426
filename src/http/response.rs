//! Response building for proxied content.
//!
//! # Design Decisions
//! - Only status, content type and body come from upstream; upstream headers are dropped
//! - Client cache lifetime follows the file extension and is always `private`
//! - `X-Proxy-Cache` tells whether the body came from the response cache

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Response, StatusCode};
use bytes::Bytes;

pub const X_PROXY_CACHE: HeaderName = HeaderName::from_static("x-proxy-cache");

/// Cache-Control for local static mounts.
pub const STATIC_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

const DAY: u32 = 86_400;
const HOUR: u32 = 3_600;
const YEAR: u32 = 31_536_000;

/// Where a proxied body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// Not eligible for caching (volatile path or non-read method).
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Bypass => "bypass",
        }
    }
}

/// Client-side max-age for a path, by extension.
pub fn max_age_for(path: &str) -> u32 {
    let file = path.rsplit('/').next().unwrap_or_default();
    let ext = match file.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return HOUR,
    };

    match ext.as_str() {
        "js" | "mjs" | "css" => DAY,
        "json" => HOUR,
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" | "ico" | "woff" | "woff2"
        | "ttf" | "otf" | "eot" => YEAR,
        _ => HOUR,
    }
}

/// Build the client response for a proxied body.
pub fn proxied(
    status: StatusCode,
    content_type: &str,
    body: Bytes,
    cache: CacheStatus,
    path: &str,
) -> Response<Body> {
    let cache_control = match cache {
        CacheStatus::Bypass => "private, no-store".to_string(),
        _ => format!("private, max-age={}", max_age_for(path)),
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    headers.insert(X_PROXY_CACHE, HeaderValue::from_static(cache.as_str()));
    response
}
