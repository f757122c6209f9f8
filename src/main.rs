use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use page_capture::{
    api::routes::create_router,
    captures::CaptureStore,
    cleanup,
    config::Config,
    document::HttpDocumentLoader,
    download::DirectorySink,
    scrapers::builtin_registry,
    service::CaptureService,
    storage::{FileStore, KeyValueStore},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("page_capture=info")),
        )
        .init();

    let config = Config::load()?;
    let server_addr = config.server_addr;

    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.storage_dir).await?);
    let removed = cleanup::purge_on_startup(storage.as_ref()).await;
    info!(removed, "startup cleanup finished");

    let registry = builtin_registry()?;
    info!(scrapers = registry.len(), "scraper registry ready");

    let service = CaptureService::new(
        Arc::new(registry),
        Arc::new(CaptureStore::new(storage)),
        Arc::new(DirectorySink::new(&config.download_dir)),
        Arc::new(HttpDocumentLoader),
    );

    let app_state = AppState {
        config: Arc::new(config),
        service: Arc::new(service),
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(server_addr).await?;
    info!("Listening on {}", server_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
