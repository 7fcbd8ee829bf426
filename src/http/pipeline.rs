//! Session-aware proxy pipeline.
//!
//! ```text
//! RECEIVED → SESSION_RESOLVED → CACHE_HIT ─────────────────────────────────→ RESPONDED
//!                             → CACHE_MISS → UPSTREAM_FETCHED → REWRITTEN → RESPONDED
//! any stage → FAILED(reason)
//! ```
//!
//! An upstream failure is always `FAILED`; stale cache content is never
//! served in its place.

use std::fmt;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use bytes::Bytes;

use super::request::{content_type, is_read};
use super::response::{proxied, CacheStatus};
use super::server::AppState;
use crate::cache::{CacheEntry, CacheKey};
use crate::error::ProxyError;
use crate::observability::metrics;
use crate::routing::RouteKind;
use crate::session::Resolution;
use crate::upstream::{CanonicalUrl, FetchRequest, UpstreamResponse};

/// Per-request pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    SessionResolved,
    CacheHit,
    CacheMiss,
    UpstreamFetched,
    Rewritten,
    Responded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Received => "RECEIVED",
            Self::SessionResolved => "SESSION_RESOLVED",
            Self::CacheHit => "CACHE_HIT",
            Self::CacheMiss => "CACHE_MISS",
            Self::UpstreamFetched => "UPSTREAM_FETCHED",
            Self::Rewritten => "REWRITTEN",
            Self::Responded => "RESPONDED",
            Self::Failed => "FAILED",
        })
    }
}

/// Records stage transitions for one request.
#[derive(Debug)]
pub struct StageTracker<'a> {
    request_id: &'a str,
    stage: Stage,
}

impl<'a> StageTracker<'a> {
    pub fn new(request_id: &'a str) -> Self {
        Self {
            request_id,
            stage: Stage::Received,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advance(&mut self, next: Stage) {
        tracing::trace!(request_id = %self.request_id, from = %self.stage, to = %next, "Pipeline transition");
        self.stage = next;
    }

    pub fn fail(&mut self, error: &ProxyError) {
        tracing::debug!(
            request_id = %self.request_id,
            stage = %self.stage,
            error = %error,
            "Pipeline failed"
        );
        self.stage = Stage::Failed;
    }
}

/// Run an API or resource request through the pipeline.
pub async fn proxy(
    state: &AppState,
    kind: RouteKind,
    jar: CookieJar,
    request: Request<Body>,
    request_id: &str,
) -> Response {
    let mut tracker = StageTracker::new(request_id);
    match run(state, kind, jar, request, &mut tracker).await {
        Ok(response) => {
            tracker.advance(Stage::Responded);
            response
        }
        Err(error) => {
            tracker.fail(&error);
            error.into_response()
        }
    }
}

async fn run(
    state: &AppState,
    kind: RouteKind,
    jar: CookieJar,
    request: Request<Body>,
    tracker: &mut StageTracker<'_>,
) -> Result<Response, ProxyError> {
    let method = request.method().clone();
    if kind == RouteKind::Resource && !is_read(&method) {
        return Err(ProxyError::MethodNotAllowed(method));
    }

    let Resolution {
        session,
        set_marker,
    } = state.sessions.resolve_request(&jar)?;
    tracker.advance(Stage::SessionResolved);

    let target = state
        .targets
        .canonicalize(request.uri().path(), request.uri().query())
        .map_err(|e| ProxyError::BadRequest(e.to_string()))?;
    let request_type = content_type(request.headers());

    let body = if is_read(&method) {
        None
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), state.config.security.max_body_size)
            .await
            .map_err(|e| ProxyError::BadRequest(e.to_string()))?;
        (!bytes.is_empty()).then_some(bytes)
    };

    let cacheable = is_cacheable(&method, &target);
    let key = CacheKey::new(session.account_id.clone(), target.as_str());

    if cacheable {
        match state.cache.get(&key).await {
            Ok(Some(entry)) => {
                metrics::record_cache_lookup("hit");
                tracker.advance(Stage::CacheHit);
                tracing::debug!(request_id = %tracker.request_id, key = %key, "Cache hit");
                let response = proxied(
                    StatusCode::OK,
                    &entry.content_type,
                    entry.body,
                    CacheStatus::Hit,
                    &target.path,
                );
                return Ok(with_marker(response, jar, set_marker));
            }
            Ok(None) => metrics::record_cache_lookup("miss"),
            Err(e) => {
                metrics::record_cache_lookup("error");
                tracing::warn!(request_id = %tracker.request_id, error = %e, "Cache lookup failed, treating as miss");
            }
        }
    }
    tracker.advance(Stage::CacheMiss);

    // HEAD is fetched as GET so the entry stored for the key is a full body
    let upstream_method = if method == Method::HEAD {
        Method::GET
    } else {
        method.clone()
    };
    let fetch = FetchRequest {
        target,
        method: upstream_method,
        body,
        content_type: request_type,
    };
    let upstream = state.upstream.fetch(&fetch, &session).await?;
    tracker.advance(Stage::UpstreamFetched);

    let body = rewrite_body(state, &upstream, tracker.request_id);
    tracker.advance(Stage::Rewritten);

    let cache_status = if cacheable && upstream.status == StatusCode::OK {
        store(state, key, body.clone(), &upstream.content_type);
        CacheStatus::Miss
    } else {
        CacheStatus::Bypass
    };

    let response = proxied(
        upstream.status,
        &upstream.content_type,
        body,
        cache_status,
        &fetch.target.path,
    );
    Ok(with_marker(response, jar, set_marker))
}

/// Rewrite an upstream body, serving it unmodified when rewriting fails.
pub(crate) fn rewrite_body(state: &AppState, upstream: &UpstreamResponse, request_id: &str) -> Bytes {
    match state.rewriter.rewrite(&upstream.body, &upstream.content_type) {
        Ok(body) => body,
        Err(e) => {
            metrics::record_rewrite_failure();
            tracing::warn!(
                request_id = %request_id,
                content_type = %upstream.content_type,
                error = %e,
                "Rewrite failed, serving body unmodified"
            );
            upstream.body.clone()
        }
    }
}

/// Store in the background so a cancelled client cannot abort the write.
fn store(state: &AppState, key: CacheKey, body: Bytes, content_type: &str) {
    let cache = state.cache.clone();
    let entry = CacheEntry::new(body, content_type);
    tokio::spawn(async move {
        if let Err(e) = cache.put(key.clone(), entry).await {
            tracing::warn!(key = %key, error = %e, "Cache store failed");
        }
    });
}

fn with_marker(
    response: Response,
    jar: CookieJar,
    marker: Option<axum_extra::extract::cookie::Cookie<'static>>,
) -> Response {
    match marker {
        Some(cookie) => (jar.add(cookie), response).into_response(),
        None => response,
    }
}

/// True when a canonical URL may be served from, and stored in, the cache.
pub fn is_cacheable(method: &Method, target: &CanonicalUrl) -> bool {
    is_read(method) && !target.volatile
}
