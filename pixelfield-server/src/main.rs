//! Grid server binary: HTTP API plus the WebSocket mutation feed.

use std::net::SocketAddr;
use std::sync::Arc;

use pixelfield_server::config::ServerConfig;
use pixelfield_server::http::{router, AppState};
use pixelfield_server::identity::IdentityResolver;
use pixelfield_server::pipeline::WritePipeline;
use pixelfield_store::{MemoryStore, PlaneStore, RocksStore, StoreConfig};
use pixelfield_sync::{BroadcastHub, FeedConfig, FeedServer};

#[tokio::main]
async fn main() {
    env_logger::init();
    let config = ServerConfig::from_env();
    log::info!(
        "Starting grid server: {}x{} @ {}bpp, cooldown {:?}, identity {:?}",
        config.dims.width,
        config.dims.height,
        config.dims.bits_per_pixel,
        config.cooldown,
        config.identity_mode
    );

    let store: Arc<dyn PlaneStore> = match &config.store_path {
        Some(path) => {
            let store_config = StoreConfig {
                path: path.clone(),
                ..StoreConfig::default()
            };
            match RocksStore::open(store_config) {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    log::error!("Failed to open plane store: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            log::warn!("Using in-memory store; state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let hub = Arc::new(BroadcastHub::new(config.feed_capacity));
    let pipeline = Arc::new(WritePipeline::new(
        store,
        hub.clone(),
        config.dims,
        config.cooldown,
        config.identity_mode.attribution_enabled(),
    ));
    let resolver = Arc::new(IdentityResolver::new(config.identity_mode.clone()));

    // Feed server on its own listener.
    let feed_config = FeedConfig {
        bind_addr: config.feed_addr.clone(),
        capacity: config.feed_capacity,
    };
    let feed_server = match FeedServer::bind(&feed_config, hub).await {
        Ok(server) => server,
        Err(e) => {
            log::error!("Failed to bind feed server on {}: {e}", config.feed_addr);
            std::process::exit(1);
        }
    };
    tokio::spawn(async move {
        if let Err(e) = feed_server.run().await {
            log::error!("Feed server stopped: {e}");
        }
    });

    let app = router(AppState { pipeline, resolver });
    let listener = match tokio::net::TcpListener::bind(&config.http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind HTTP server on {}: {e}", config.http_addr);
            std::process::exit(1);
        }
    };
    log::info!("HTTP API listening on {}", config.http_addr);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        log::error!("HTTP server stopped: {e}");
        std::process::exit(1);
    }
}
