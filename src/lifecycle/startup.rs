//! Startup orchestration.
//!
//! # Responsibilities
//! - Load credentials and check the guest account exists
//! - Start the metrics exporter when enabled
//! - Bind the listener last (traffic only when ready)

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use super::shutdown::Shutdown;
use crate::config::{ConfigError, ProxyConfig};
use crate::credentials::{CredentialError, CredentialStore};
use crate::http::HttpServer;
use crate::observability::metrics;
use crate::rewrite::RewriteError;

/// Fatal errors; the process refuses to start.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load credentials: {0}")]
    Credentials(#[from] CredentialError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to compile rewrite rules: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to load TLS material: {0}")]
    Tls(#[source] io::Error),

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Load every configured account and require the guest account.
pub fn load_credentials(config: &ProxyConfig) -> Result<CredentialStore, StartupError> {
    let store = CredentialStore::load(&config.accounts)?;
    store.require(&config.session.guest_account)?;
    Ok(store)
}

pub async fn bind_listener(address: &str) -> Result<TcpListener, StartupError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })?;
    if let Ok(local) = listener.local_addr() {
        tracing::info!(address = %local, "Listening for connections");
    }
    Ok(listener)
}

/// Start every subsystem and serve until `shutdown` fires.
pub async fn run(config: ProxyConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    let credentials = load_credentials(&config)?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, credentials)?;
    let listener = bind_listener(&bind_address).await?;
    server.run(listener, shutdown.subscribe()).await
}
