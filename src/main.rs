use std::path::PathBuf;

use clap::Parser;

use session_proxy::config::load_config;
use session_proxy::lifecycle::{signals, startup, Shutdown};
use session_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "session-proxy")]
#[command(about = "Session-aware caching reverse proxy with content rewriting", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Validate configuration and credentials, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init(&config.observability);

    tracing::info!("session-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        public_origin = %config.listener.public_origin,
        upstream = %config.upstream.origin,
        cache_ttl_secs = config.cache.ttl_secs,
        max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    if args.check {
        let store = startup::load_credentials(&config)?;
        tracing::info!(accounts = store.len(), "Configuration is valid");
        return Ok(());
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
