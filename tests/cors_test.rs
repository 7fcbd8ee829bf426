//! Cross-origin access for configured origins.

use axum::http::{Method, StatusCode};

mod common;

use common::{proxy_config, MockReply, MockUpstream, TestProxy};

const UI_ORIGIN: &str = "https://ui.example.com";

async fn cors_proxy(upstream: &MockUpstream) -> TestProxy {
    let mut config = proxy_config(upstream);
    config.cors.allowed_origins = vec![UI_ORIGIN.to_string()];
    TestProxy::start(config).await
}

#[tokio::test]
async fn test_preflight_allows_app_headers() {
    let upstream = MockUpstream::start(|_, _| MockReply::ok("application/json", "{}")).await;
    let proxy = cors_proxy(&upstream).await;

    let res = proxy
        .client
        .request(Method::OPTIONS, proxy.url("/api/feed"))
        .header("origin", UI_ORIGIN)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "x-csrf-protection,content-type")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let headers = res.headers();
    assert_eq!(headers["access-control-allow-origin"], UI_ORIGIN);
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["access-control-max-age"], "86400");

    let allowed = headers["access-control-allow-headers"].to_str().unwrap().to_ascii_lowercase();
    for name in ["x-csrf-protection", "content-type", "x-requested-with", "cookie"] {
        assert!(allowed.contains(name), "{name} missing from {allowed}");
    }
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_unlisted_origin_gets_no_allow_header() {
    let upstream = MockUpstream::start(|_, _| MockReply::ok("application/json", "{}")).await;
    let proxy = cors_proxy(&upstream).await;

    let res = proxy
        .client
        .request(Method::OPTIONS, proxy.url("/api/feed"))
        .header("origin", "https://evil.example.com")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();

    assert!(res.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_simple_request_echoes_allowed_origin() {
    let upstream = MockUpstream::start(|_, _| MockReply::ok("application/json", "{}")).await;
    let proxy = cors_proxy(&upstream).await;

    let res = proxy
        .client
        .get(proxy.url("/__proxy/accounts"))
        .header("origin", UI_ORIGIN)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], UI_ORIGIN);
}
