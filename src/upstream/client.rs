//! Outbound HTTP client with bounded retry.

use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use bytes::Bytes;

use super::target::CanonicalUrl;
use super::UpstreamError;
use crate::config::ProxyConfig;
use crate::observability::metrics;
use crate::resilience::{with_deadline, AttemptFailure, RetryPolicy};
use crate::session::ResolvedSession;

const SEC_CH_UA: HeaderName = HeaderName::from_static("sec-ch-ua");

/// One logical upstream request. Retried as a unit.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub target: CanonicalUrl,
    pub method: Method,
    pub body: Option<Bytes>,
    pub content_type: Option<String>,
}

impl FetchRequest {
    pub fn get(target: CanonicalUrl) -> Self {
        Self {
            target,
            method: Method::GET,
            body: None,
            content_type: None,
        }
    }
}

/// The parts of an upstream response the proxy keeps.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

/// Issues credentialed requests to the upstream origins.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    default_headers: HeaderMap,
    blocked_fields: HashSet<String>,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs));
        if !config.upstream.use_system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.upstream.extra_headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    default_headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping invalid upstream header"),
            }
        }

        Ok(Self {
            http,
            retry: RetryPolicy::from_config(&config.retries),
            attempt_timeout: Duration::from_secs(config.timeouts.attempt_secs),
            default_headers,
            blocked_fields: config.upstream.blocked_cookie_fields.iter().cloned().collect(),
        })
    }

    /// Fetch `request` for `session`, retrying up to the attempt ceiling.
    ///
    /// Transport failures, timeouts, non-success statuses and JSON bodies
    /// carrying an `error` field are retried; the last one is returned once
    /// the ceiling is reached.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        session: &ResolvedSession,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let headers = self.outbound_headers(request, session);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome =
                with_deadline(self.attempt_timeout, self.attempt(request, headers.clone())).await;

            match outcome {
                Ok(response) => {
                    metrics::record_upstream_attempt("success");
                    tracing::debug!(
                        url = %request.target.as_str(),
                        account = %session.account_id,
                        status = response.status.as_u16(),
                        attempt,
                        "Upstream fetch succeeded"
                    );
                    return Ok(response);
                }
                Err(failure) => {
                    metrics::record_upstream_attempt(failure.label());
                    tracing::warn!(
                        url = %request.target.as_str(),
                        account = %session.account_id,
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        failure = ?failure,
                        "Upstream attempt failed"
                    );

                    if !self.retry.allows_retry_after(attempt) {
                        return Err(UpstreamError::from_failure(failure, attempt));
                    }
                    tokio::time::sleep(self.retry.backoff()).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        request: &FetchRequest,
        headers: HeaderMap,
    ) -> Result<UpstreamResponse, AttemptFailure> {
        let mut url = request.target.url.clone();
        if request.target.volatile {
            add_cache_busters(&mut url);
        }

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(transport_failure)?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response.bytes().await.map_err(transport_failure)?;

        if !status.is_success() || is_error_payload(&content_type, &body) {
            return Err(AttemptFailure::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }

    fn outbound_headers(&self, request: &FetchRequest, session: &ResolvedSession) -> HeaderMap {
        let mut headers = self.default_headers.clone();

        if let Some(content_type) = request
            .content_type
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(header::CONTENT_TYPE, content_type);
        }

        if request.target.volatile {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        }

        if !request.target.attach_credentials {
            return headers;
        }

        let credential = &session.credential;
        let cookie = credential.session_token.filtered(&self.blocked_fields);
        match HeaderValue::from_str(&cookie) {
            Ok(value) if !cookie.is_empty() => {
                headers.insert(header::COOKIE, value);
            }
            Ok(_) => {}
            Err(_) => tracing::warn!(
                account = %session.account_id,
                "Session token is not a valid header value, sending without cookie"
            ),
        }

        if let Some(ua) = credential
            .user_agent
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(header::USER_AGENT, ua);
        }
        if let Some(sec) = credential
            .sec_ch_ua
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(SEC_CH_UA, sec);
        }

        headers
    }
}

fn transport_failure(err: reqwest::Error) -> AttemptFailure {
    if err.is_timeout() {
        AttemptFailure::Timeout
    } else {
        AttemptFailure::Transport(err.to_string())
    }
}

/// Timestamp and nonce so upstream caches cannot answer one account with another's data.
fn add_cache_busters(url: &mut url::Url) {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let nonce = format!("{:016x}", fastrand::u64(..));
    url.query_pairs_mut()
        .append_pair("_ts", &ts.to_string())
        .append_pair("_nonce", &nonce);
}

/// A JSON object whose top-level `error` is set to anything truthy.
fn is_error_payload(content_type: &str, body: &[u8]) -> bool {
    if !content_type.contains("json") {
        return false;
    }
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return false;
    };
    match value.get("error") {
        None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => false,
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
