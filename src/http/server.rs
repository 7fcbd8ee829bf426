//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single dispatching fallback handler
//! - Wire up middleware (request ID, tracing, timeout, body limit, CORS)
//! - Classify each request and hand it to the matching branch
//! - Serve over plain TCP or TLS until shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Method, Request};
use axum::response::Response;
use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::request::{request_id, X_REQUEST_ID};
use super::{control, pipeline, static_files};
use crate::cache::{spawn_sweeper, MemoryStore, ResponseStore};
use crate::config::{CorsConfig, ProxyConfig};
use crate::credentials::CredentialStore;
use crate::lifecycle::StartupError;
use crate::net::load_tls_config;
use crate::observability::metrics;
use crate::rewrite::Rewriter;
use crate::routing::{RouteKind, RouteTable};
use crate::session::SessionResolver;
use crate::upstream::{UpstreamClient, UpstreamTargets};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub routes: Arc<RouteTable>,
    pub sessions: Arc<SessionResolver>,
    pub targets: Arc<UpstreamTargets>,
    pub upstream: Arc<UpstreamClient>,
    pub cache: Arc<dyn ResponseStore>,
    pub rewriter: Arc<Rewriter>,
}

/// HTTP server for the session proxy.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Build a server backed by the in-memory response store.
    pub fn new(config: ProxyConfig, credentials: CredentialStore) -> Result<Self, StartupError> {
        let cache: Arc<dyn ResponseStore> =
            Arc::new(MemoryStore::new(Duration::from_secs(config.cache.ttl_secs)));
        Self::with_cache(config, credentials, cache)
    }

    /// Build a server around an injected response store.
    pub fn with_cache(
        config: ProxyConfig,
        credentials: CredentialStore,
        cache: Arc<dyn ResponseStore>,
    ) -> Result<Self, StartupError> {
        let upstream = UpstreamClient::new(&config)?;
        let rewriter = Rewriter::from_config(&config)?;
        let targets = UpstreamTargets::new(&config.upstream, &config.listener.public_origin);
        let sessions = SessionResolver::new(Arc::new(credentials), config.session.clone());

        let state = AppState {
            routes: Arc::new(RouteTable::from_config(&config)),
            sessions: Arc::new(sessions),
            targets: Arc::new(targets),
            upstream: Arc::new(upstream),
            cache,
            rewriter: Arc::new(rewriter),
            config: Arc::new(config),
        };
        Ok(Self { state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.state.config
    }

    /// The full Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let config = &self.state.config;
        let mut router = Router::new()
            .fallback(dispatch)
            .with_state(self.state.clone());

        if let Some(cors) = cors_layer(&config.cors) {
            router = router.layer(cors);
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
                .map_response(|res: Response<_>| res.map(Body::new))
                .layer(RequestBodyLimitLayer::new(config.security.max_body_size)),
        )
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), StartupError> {
        let addr = listener.local_addr().map_err(StartupError::Serve)?;
        let config = self.state.config.clone();

        let sweeper = (config.cache.sweep_interval_secs > 0).then(|| {
            spawn_sweeper(
                self.state.cache.clone(),
                Duration::from_secs(config.cache.sweep_interval_secs),
                shutdown.resubscribe(),
            )
        });

        let app = self.router();

        match &config.listener.tls {
            Some(tls) => {
                let rustls = load_tls_config(tls).await.map_err(StartupError::Tls)?;
                let handle = axum_server::Handle::new();
                let drain = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    drain.graceful_shutdown(Some(Duration::from_secs(10)));
                });

                tracing::info!(address = %addr, "HTTPS server starting");
                let std_listener = listener.into_std().map_err(StartupError::Serve)?;
                axum_server::from_tcp_rustls(std_listener, rustls)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await
                    .map_err(StartupError::Serve)?;
            }
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await
                    .map_err(StartupError::Serve)?;
            }
        }

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    let headers: Vec<HeaderName> = config
        .allowed_headers
        .iter()
        .filter_map(|h| match HeaderName::from_bytes(h.as_bytes()) {
            Ok(name) => Some(name),
            Err(_) => {
                tracing::warn!(header = %h, "Ignoring invalid CORS header");
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(headers)
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.max_age_secs)),
    )
}

/// Single entry point: classify, then hand off to the matching branch.
async fn dispatch(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers());
    let kind = state.routes.classify(request.uri().path());

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        route = kind.label(),
        "Dispatching request"
    );

    let response = match kind {
        RouteKind::Static(idx) => static_files::serve(&state, idx, request).await,
        RouteKind::Stub(idx) => static_files::stub(&state, idx),
        RouteKind::Control => control::handle(&state, jar, request, &request_id).await,
        RouteKind::Api | RouteKind::Resource => {
            pipeline::proxy(&state, kind, jar, request, &request_id).await
        }
    };

    metrics::record_request(kind.label(), response.status().as_u16(), start);
    response
}
