use misp_global_search::{
    api::{build_router, AppState},
    config::Config,
    logging::init_tracing,
    reindex::ReindexCoordinator,
    search::QueryComposer,
    source::create_fetcher,
    store::{IndexStore, MeilisearchStore},
    watcher::{FreshnessWatcher, GithubCommits},
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    init_tracing(&config.observability);

    tracing::info!("Starting MISP Global Search v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = misp_global_search::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Search store
    let store: Arc<dyn IndexStore> = Arc::new(MeilisearchStore::new(&config.meilisearch)?);
    tracing::info!(url = %config.meilisearch.url, "Meilisearch store configured");

    let composer = Arc::new(QueryComposer::new(
        store.clone(),
        config.indexes.clone(),
        Duration::from_secs(config.search.index_cache_ttl_secs),
    ));

    // Freshness watcher
    if config.watcher.enabled {
        let fetcher = create_fetcher(&config.sources)?;
        let coordinator = Arc::new(ReindexCoordinator::new(
            store.clone(),
            fetcher,
            config.indexes.clone(),
        ));
        let revisions = Arc::new(GithubCommits::new(&config.sources)?);
        let watcher = Arc::new(FreshnessWatcher::new(
            coordinator,
            revisions,
            &config.sources,
            &config.watcher,
        ));

        tokio::spawn(async move {
            watcher.run().await;
        });
        tracing::info!(interval_secs = config.watcher.interval_secs, "Freshness watcher started");
    } else {
        tracing::info!("Freshness watcher disabled in configuration");
    }

    let app_state = AppState::new(composer)
        .with_default_page_size(config.search.default_page_size)
        .with_metrics(config.observability.prometheus_enabled);
    let app = build_router(app_state);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP server listening on http://{}", http_addr);
    tracing::info!("   Search: http://{}/search?q=&index=all", http_addr);
    tracing::info!("   Indexes: http://{}/indexes", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}
