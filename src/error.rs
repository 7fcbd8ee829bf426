//! Client-facing error taxonomy.
//!
//! Every error that can end a proxied request is funneled through
//! [`ProxyError`], and its `IntoResponse` impl is the only place where
//! internal failures become HTTP status codes. Bodies carry a stable code and
//! a generic message; upstream detail stays in the logs.

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheError;
use crate::upstream::UpstreamError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no credential for account `{account}`")]
    Unauthorized { account: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: &'static str,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, message) = match self {
            Self::Unauthorized { .. } => ("unauthorized", "Account not found"),
            Self::Upstream(_) => ("bad_gateway", "Upstream request failed"),
            Self::Cache(_) => ("unavailable", "Cache temporarily unavailable"),
            Self::MethodNotAllowed(_) => ("method_not_allowed", "Method not allowed"),
            Self::BadRequest(_) => ("bad_request", "Malformed request"),
            Self::NotFound => ("not_found", "Not found"),
        };
        ErrorBody { error, message }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self {
            Self::Upstream(_) | Self::Cache(_) => {
                tracing::error!(error = %self, "Request failed");
            }
            _ => tracing::debug!(error = %self, "Request rejected"),
        }
        (self.status(), Json(self.body())).into_response()
    }
}
