//! Control API under the configured prefix.
//!
//! - `GET  /accounts` lists accounts without resolving a session
//! - `POST /switch`   pins the client to another account
//! - `POST /refresh`  re-primes the cache for the caller's account

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use super::pipeline::{is_cacheable, rewrite_body};
use super::server::AppState;
use crate::cache::{CacheEntry, CacheKey};
use crate::error::ProxyError;
use crate::session::switch_account;
use crate::upstream::FetchRequest;

#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    pub account: String,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
}

pub async fn handle(
    state: &AppState,
    jar: CookieJar,
    request: Request<Body>,
    request_id: &str,
) -> Response {
    let endpoint = state
        .routes
        .control_endpoint(request.uri().path())
        .unwrap_or("/")
        .to_string();
    let method = request.method().clone();

    let result = match (method.clone(), endpoint.as_str()) {
        (Method::GET, "/accounts") => Ok(Json(state.sessions.store().list()).into_response()),
        (Method::POST, "/switch") => switch(state, jar, request).await,
        (Method::POST, "/refresh") => refresh(state, jar, request_id).await,
        (_, "/accounts" | "/switch" | "/refresh") => Err(ProxyError::MethodNotAllowed(method)),
        _ => Err(ProxyError::NotFound),
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

async fn switch(
    state: &AppState,
    jar: CookieJar,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let bytes = axum::body::to_bytes(request.into_body(), state.config.security.max_body_size)
        .await
        .map_err(|e| ProxyError::BadRequest(e.to_string()))?;
    let body: SwitchRequest =
        serde_json::from_slice(&bytes).map_err(|e| ProxyError::BadRequest(e.to_string()))?;

    let marker = state.sessions.marker(&jar).map(str::to_string);
    let (session, outcome) = switch_account(
        &state.sessions,
        state.cache.as_ref(),
        marker.as_deref(),
        &body.account,
    )
    .await?;

    let cookie = state.sessions.marker_cookie(&session.account_id);
    Ok((jar.add(cookie), Json(outcome)).into_response())
}

/// Fetch each refresh path bypassing the cache, then store the rewritten body.
async fn refresh(
    state: &AppState,
    jar: CookieJar,
    request_id: &str,
) -> Result<Response, ProxyError> {
    let resolution = state.sessions.resolve_request(&jar)?;
    let session = resolution.session;
    let mut report = RefreshReport::default();

    for raw in &state.config.cache.refresh_paths {
        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (raw.as_str(), None),
        };

        let target = match state.targets.canonicalize(path, query) {
            Ok(target) if is_cacheable(&Method::GET, &target) => target,
            Ok(_) => {
                tracing::warn!(request_id = %request_id, path = %raw, "Refresh path is volatile, skipping");
                report.failed.push(raw.clone());
                continue;
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, path = %raw, error = %e, "Invalid refresh path");
                report.failed.push(raw.clone());
                continue;
            }
        };

        let key = CacheKey::new(session.account_id.clone(), target.as_str());
        let upstream = match state.upstream.fetch(&FetchRequest::get(target), &session).await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(request_id = %request_id, path = %raw, error = %e, "Refresh fetch failed");
                report.failed.push(raw.clone());
                continue;
            }
        };

        if upstream.status != StatusCode::OK {
            tracing::warn!(request_id = %request_id, path = %raw, status = %upstream.status, "Refresh response not storable");
            report.failed.push(raw.clone());
            continue;
        }

        let body = rewrite_body(state, &upstream, request_id);
        match state
            .cache
            .put(key, CacheEntry::new(body, upstream.content_type.clone()))
            .await
        {
            Ok(()) => report.refreshed.push(raw.clone()),
            Err(e) => {
                tracing::warn!(request_id = %request_id, path = %raw, error = %e, "Refresh store failed");
                report.failed.push(raw.clone());
            }
        }
    }

    tracing::info!(
        request_id = %request_id,
        account = %session.account_id,
        refreshed = report.refreshed.len(),
        failed = report.failed.len(),
        "Cache refreshed"
    );

    let response = Json(report).into_response();
    Ok(match resolution.set_marker {
        Some(cookie) => (jar.add(cookie), response).into_response(),
        None => response,
    })
}
