use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rally_watch::config::AppConfig;
use rally_watch::geocode::{GeocodeCache, NominatimClient};
use rally_watch::notify::{
    ConfiguredNotifier, LogNotifier, NotificationDispatcher, TelegramNotifier,
};
use rally_watch::rally::{ConfiguredSource, MockRouteSource, RallyClient};
use rally_watch::store::{FavoriteStore, RouteStore};
use rally_watch::sync::{SyncEngine, spawn_scheduler};
use rally_watch::web::{AppState, create_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rally_watch=info,tower_http=info")),
        )
        .init();

    if let Err(e) = dotenv {
        tracing::debug!("No .env file loaded: {e}");
    }

    let config = AppConfig::from_env()?;
    info!(data_dir = %config.data_dir.display(), "Starting rally watch");

    let source = match &config.mock_routes {
        Some(path) => {
            info!(path = %path.display(), "Serving routes from snapshot file");
            ConfiguredSource::Mock(MockRouteSource::from_file(path)?)
        }
        None => ConfiguredSource::Live(RallyClient::new(config.rally.clone())?),
    };

    let notifier = match &config.telegram {
        Some(telegram) => ConfiguredNotifier::Telegram(TelegramNotifier::new(telegram.clone())?),
        None => {
            warn!("TELEGRAM_BOT_TOKEN not set, notifications will only be logged");
            ConfiguredNotifier::Log(LogNotifier)
        }
    };

    // Fail fast on unreadable state rather than starting empty.
    let favorites = Arc::new(FavoriteStore::open(config.favorites_path())?);
    let geocoder = Arc::new(GeocodeCache::open(
        NominatimClient::new(config.nominatim.clone())?,
        config.geocode_cache_path(),
    )?);
    let dispatcher =
        NotificationDispatcher::new(notifier, Arc::clone(&favorites), config.booking_url.clone());

    let engine = Arc::new(SyncEngine::new(
        source,
        geocoder,
        RouteStore::new(config.routes_path()),
        dispatcher,
        favorites,
        config.sync.clone(),
    )?);

    let scheduler = spawn_scheduler(Arc::clone(&engine));

    let app = create_router(AppState::new(Arc::clone(&engine), config.booking_url.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown().await;
    scheduler.abort();
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
