use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mtn_web::{
    api,
    auth::Authenticator,
    config::Config,
    daemon::DaemonClient,
    downloads::{default_matchers, DownloadIndex, MetadataCache},
    feeds::FeedAggregator,
    storage::Database,
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "mtn-web starting");

    // Load configuration
    let config = Config::load()?;

    // Initialize database and session secret
    let db = Database::open(&config.server.data_dir)?;
    info!("Database opened at: {}", config.server.data_dir);

    let auth = Authenticator::open(&config.server.data_dir, config.session_ttl_secs)?;

    // Download index and its persisted size/checksum cache
    let downloads = DownloadIndex::new(&config.site.downloads_dir, default_matchers());
    let mut metadata = MetadataCache::new(&config.site.downloads_dir, &config.site.cache_dir);
    if let Err(e) = metadata.load() {
        tracing::warn!(error = %e, "Starting with an empty download metadata cache");
    }

    let feeds = FeedAggregator::new(&config.feeds, &config.site.cache_dir);
    let daemon = DaemonClient::new(&config.daemon);

    // Create shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth,
        daemon,
        feeds,
        downloads,
        metadata: Mutex::new(metadata),
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Listening on: {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Persist the metadata cache before exiting
    if let Ok(mut metadata) = state.metadata.lock() {
        if let Err(e) = metadata.flush() {
            tracing::error!(error = %e, "Failed to flush download metadata cache during shutdown");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
