use crate::config::Config;
use crate::services::{load_catalog, SoundCloudAudio, TelegramClient, YouTubeAudio, YouTubeSearch};
use actix_rt::signal::unix;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use broadcast_engine::{
    AcquisitionPipeline, AudioSource, Catalog, ContentCache, SearchSource, SessionRegistry,
    TrackProvider,
};
use futures_lite::FutureExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use track_sources::YtDlpClient;
use tracing::{debug, error, info};

mod config;
mod http;
mod services;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    let mut terminate = unix::signal(unix::SignalKind::terminate())?;
    let mut interrupt = unix::signal(unix::SignalKind::interrupt())?;

    dotenv::dotenv().ok();
    env_logger::init();

    let config = Arc::from(Config::from_env());

    info!(version = VERSION, "Starting application...");

    let catalog: Arc<dyn Catalog> = Arc::new(
        load_catalog(config.catalog_path.as_deref().map(Path::new))
            .await
            .expect("Unable to load catalog"),
    );
    let content_cache = Arc::new(
        ContentCache::create(&config.downloads_directory, config.content_cache_ttl())
            .await
            .expect("Unable to initialize downloads directory"),
    );
    let ytdlp_client = Arc::new(YtDlpClient::new(&config.ytdlp_path));

    let search_sources: Vec<Arc<dyn SearchSource>> =
        vec![Arc::new(YouTubeSearch::new(Arc::clone(&ytdlp_client)))];
    let audio_sources: Vec<Arc<dyn AudioSource>> = vec![
        Arc::new(SoundCloudAudio::new(Arc::clone(&ytdlp_client))),
        Arc::new(YouTubeAudio::new(Arc::clone(&ytdlp_client))),
    ];

    let pipeline: Arc<dyn TrackProvider> = Arc::new(AcquisitionPipeline::new(
        search_sources,
        audio_sources,
        Arc::clone(&content_cache),
        config.pipeline_settings(),
    ));
    let telegram_client =
        TelegramClient::create(&config.telegram_api_url, &config.telegram.bot_token);

    let registry = Arc::new(SessionRegistry::new(
        Arc::clone(&pipeline),
        Arc::new(telegram_client),
        Arc::clone(&catalog),
        config.session_settings(),
    ));

    let cache_purge = actix_rt::spawn({
        let content_cache = Arc::clone(&content_cache);

        async move {
            let mut interval = actix_rt::time::interval(CACHE_PURGE_INTERVAL);

            loop {
                interval.tick().await;

                let purged = content_cache.purge_expired().await;
                debug!(purged, remaining = content_cache.len(), "Content cache purged");
            }
        }
    });

    let shutdown_timeout = config.shutdown_timeout;
    let bind_address = config.bind_address.clone();

    let track_index = Data::new(http::TrackIndex::new());

    let server = HttpServer::new({
        let registry = Arc::clone(&registry);

        move || {
            App::new()
                .app_data(Data::new(Arc::clone(&registry)))
                .app_data(Data::new(Arc::clone(&catalog)))
                .app_data(Data::new(Arc::clone(&pipeline)))
                .app_data(track_index.clone())
                .configure(http::routes)
        }
    })
    .shutdown_timeout(shutdown_timeout)
    .bind(bind_address)?
    .run();

    let server_handle = server.handle();

    actix_rt::spawn({
        async move {
            if let Err(error) = server.await {
                error!(?error, "Error on http server");
            }
        }
    });

    info!("Application started");

    interrupt.recv().or(terminate.recv()).await;

    info!("Received shutdown signal. Shutting down gracefully...");

    registry.stop_all().await;
    cache_purge.abort();

    server_handle.stop(true).await;

    Ok(())
}
