//! Local static mounts and stub routes.
//!
//! Neither touches sessions or the response cache.

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use super::response::STATIC_CACHE_CONTROL;
use super::server::AppState;
use crate::error::ProxyError;

/// Serve a file from the mount at `idx`, with the mount prefix stripped.
pub async fn serve(state: &AppState, idx: usize, request: Request<Body>) -> Response {
    let Some(mount) = state.routes.static_mount(idx) else {
        return ProxyError::NotFound.into_response();
    };

    let (mut parts, body) = request.into_parts();
    let rest = mount.matcher.strip(parts.uri.path()).unwrap_or("/");
    let relative = match parts.uri.query() {
        Some(query) => format!("{rest}?{query}"),
        None => rest.to_string(),
    };
    parts.uri = match relative.parse::<Uri>() {
        Ok(uri) => uri,
        Err(e) => return ProxyError::BadRequest(e.to_string()).into_response(),
    };

    let service = ServeDir::new(&mount.config.dir).append_index_html_on_directories(true);
    let mut response = match service.oneshot(Request::from_parts(parts, body)).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    if response.status().is_success() {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(STATIC_CACHE_CONTROL),
        );
    }
    response
}

/// Answer a stub path with its fixed body.
pub fn stub(state: &AppState, idx: usize) -> Response {
    let Some(stub) = state.routes.stub(idx) else {
        return ProxyError::NotFound.into_response();
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, stub.config.content_type.clone()),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        stub.config.body.clone(),
    )
        .into_response()
}
