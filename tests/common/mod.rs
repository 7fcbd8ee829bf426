//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use session_proxy::cache::ResponseStore;
use session_proxy::config::{AccountConfig, ProxyConfig};
use session_proxy::credentials::CredentialStore;
use session_proxy::http::HttpServer;
use session_proxy::lifecycle::Shutdown;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    /// Path plus query, as sent on the request line.
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, q)| q)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// What the mock upstream does with a request.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond {
        status: u16,
        content_type: String,
        body: Vec<u8>,
    },
    /// Close the connection without answering.
    Drop,
    /// Hold the connection open for a while, then close it without answering.
    Stall(std::time::Duration),
}

impl MockReply {
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::Respond {
            status: 200,
            content_type: content_type.to_string(),
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self::Respond {
            status,
            content_type: "text/plain".to_string(),
            body: b"upstream says no".to_vec(),
        }
    }
}

/// A programmable raw-TCP upstream on an ephemeral port.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockUpstream {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&CapturedRequest, usize) -> MockReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder = Arc::new(responder);

        let captured = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let responder = responder.clone();
                let captured = captured.clone();
                tokio::spawn(async move {
                    handle(socket, responder, captured).await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn handle<F>(
    mut socket: TcpStream,
    responder: Arc<F>,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
) where
    F: Fn(&CapturedRequest, usize) -> MockReply + Send + Sync + 'static,
{
    let Some(request) = read_request(&mut socket).await else {
        return;
    };

    let index = {
        let mut all = captured.lock().unwrap();
        all.push(request.clone());
        all.len() - 1
    };

    match responder(&request, index) {
        MockReply::Respond {
            status,
            content_type,
            body,
        } => {
            let head = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nSet-Cookie: upstream_secret=1\r\nConnection: close\r\n\r\n",
                reason(status),
                body.len(),
            );
            let mut response = head.into_bytes();
            response.extend_from_slice(&body);
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        }
        MockReply::Drop => {
            drop(socket);
        }
        MockReply::Stall(delay) => {
            tokio::time::sleep(delay).await;
            drop(socket);
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(CapturedRequest {
        method,
        target,
        headers,
        body,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

pub const PUBLIC_ORIGIN: &str = "http://localhost:8080";

pub fn account(id: &str) -> AccountConfig {
    AccountConfig {
        id: id.to_string(),
        name: format!("Account {id}"),
        cookie: Some(format!("sid={id}; __cf_bm=fingerprint")),
        credential_file: None,
        user_agent: Some(format!("agent-{id}")),
        sec_ch_ua: None,
    }
}

/// Config pointing at `upstream` with accounts guest, demo1 and demo2.
pub fn proxy_config(upstream: &MockUpstream) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.listener.public_origin = PUBLIC_ORIGIN.to_string();
    config.upstream.origin = upstream.origin();
    config.retries.backoff_ms = 10;
    config.timeouts.attempt_secs = 5;
    config.accounts = vec![account("guest"), account("demo1"), account("demo2")];
    config
}

/// A running proxy on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
}

impl TestProxy {
    pub async fn start(config: ProxyConfig) -> Self {
        let credentials = CredentialStore::load(&config.accounts).unwrap();
        Self::serve(HttpServer::new(config, credentials).unwrap()).await
    }

    /// Start with an injected response store.
    pub async fn start_with_cache(config: ProxyConfig, cache: Arc<dyn ResponseStore>) -> Self {
        let credentials = CredentialStore::load(&config.accounts).unwrap();
        Self::serve(HttpServer::with_cache(config, credentials, cache).unwrap()).await
    }

    async fn serve(server: HttpServer) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, rx).await;
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .pool_max_idle_per_host(0)
            .build()
            .unwrap();

        Self {
            addr,
            shutdown,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// GET `path` as `account` (no marker cookie when `None`).
    pub async fn get(&self, path: &str, account: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(account) = account {
            req = req.header("cookie", format!("proxy_account={account}"));
        }
        req.send().await.unwrap()
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Give spawned cache writes a moment to land.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
