//! Request identification and inspection.
//!
//! # Design Decisions
//! - Request ID added as early as possible (outermost layer) for tracing
//! - A client-supplied `x-request-id` is kept rather than replaced

use axum::http::{header, HeaderMap, HeaderName, Method};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request ID assigned by `SetRequestIdLayer`, or a fresh one outside the stack.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Declared content type of the request body, if any.
pub fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// GET and HEAD never carry a body worth forwarding.
pub fn is_read(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_id_fallback() {
        let mut headers = HeaderMap::new();
        let generated = request_id(&headers);
        assert!(Uuid::parse_str(&generated).is_ok());
        assert_ne!(generated, request_id(&headers));
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc"));
        assert_eq!(request_id(&headers), "abc");
    }

    #[test]
    fn test_is_read() {
        assert!(is_read(&Method::GET));
        assert!(is_read(&Method::HEAD));
        assert!(!is_read(&Method::POST));
    }
}
