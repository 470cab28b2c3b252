//! docserve - Markdown documents over HTTP
//!
//! # Startup Sequence
//! 1. Parse command-line arguments and load the configuration file
//! 2. Initialize tracing
//! 3. Validate configuration (or list URLs and exit)
//! 4. Load the page template, create the cache store and spawn the
//!    reaper / invalidator
//! 5. Serve until SIGINT/SIGTERM, then shut down within a bounded grace period

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use docserve::render::Layout;
use docserve::{
    create_router, join_within, logging, spawn_invalidator, spawn_reaper, urls, AppState, Config,
};

/// Bound on draining connections, and again on stopping background tasks
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(
    name = "docserve",
    version,
    about = "Serve Markdown documents as cached HTML",
    disable_help_flag = true
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short = 'c', long = "config", env = "DOCSERVE_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Path to an HTML page template (defaults to the built-in layout)
    #[arg(short = 'h', long = "template")]
    template: Option<PathBuf>,

    /// Print the available URLs and exit
    #[arg(short = 'l', long = "list")]
    list: bool,

    /// Print help
    #[arg(long = "help", action = clap::ArgAction::Help)]
    help: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration file ({})", cli.config.display()))?;

    logging::init(&config.general.log_level, &config.general.log_type);

    if !cli.list {
        info!(version = env!("CARGO_PKG_VERSION"), "Starting docserve");
    }

    config
        .validate()
        .with_context(|| format!("configuration validation failed ({})", cli.config.display()))?;

    if cli.list {
        for url in urls::list_urls(&config).context("failed to list URLs")? {
            println!("{url}");
        }
        return Ok(());
    }

    let config = config.normalized();
    info!(
        root = %config.html.markdown_root_dir.display(),
        ttl_secs = config.ttl_seconds(),
        max_entries = config.max_entries(),
        hot_reload = config.cache.hot_reload,
        strict_html_url = config.html.strict_html_url,
        "Configuration loaded"
    );

    let layout = match &cli.template {
        Some(path) => load_layout(path)?,
        None => Layout::Embedded,
    };

    let state = AppState::from_config(&config, layout);
    let cancel = CancellationToken::new();
    let mut background: Vec<JoinHandle<()>> = Vec::new();

    if let Some(interval) = config.reaper_interval() {
        background.push(spawn_reaper(state.store.clone(), interval, cancel.clone()));
    }

    if config.cache.hot_reload {
        match spawn_invalidator(
            state.store.clone(),
            &config.html.markdown_root_dir,
            cancel.clone(),
        ) {
            Ok(handle) => background.push(handle),
            Err(err) => error!(err = %err, "Hot reload unavailable; relying on TTL only"),
        }
    }

    let store = state.store.clone();
    let app = create_router(state);

    let addr = config.listen_socket();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Server listening");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cancel.clone()));
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => {
            result.context("server task failed")?.context("server error")?;
        }
        _ = cancel.cancelled() => {
            match join_within(SHUTDOWN_GRACE, server).await {
                Some(result) => result.context("server task failed")?.context("server error")?,
                None => warn!("Open connections did not drain in time"),
            }
        }
    }

    cancel.cancel();
    let drain = tokio::spawn(async move {
        for handle in background {
            if let Err(err) = handle.await {
                warn!(err = %err, "Background task ended abnormally");
            }
        }
    });
    if join_within(SHUTDOWN_GRACE, drain).await.is_none() {
        warn!("Background tasks did not stop in time");
    }

    let stats = store.stats().snapshot();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        evictions = stats.evictions,
        expired = stats.expired,
        invalidations = stats.invalidations,
        hit_rate = stats.hit_rate(),
        "Server exiting"
    );
    Ok(())
}

fn load_layout(path: &Path) -> Result<Layout> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template file ({})", path.display()))?;
    let layout = Layout::custom(source)
        .with_context(|| format!("failed to parse template file ({})", path.display()))?;
    info!(path = %path.display(), "Using custom page template");
    Ok(layout)
}

/// Waits for Ctrl+C or SIGTERM, then cancels the background tasks.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }

    cancel.cancel();
}
