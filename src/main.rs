use oai_index_sync::{
    api::{build_router, AppState},
    config::Config,
    search::{create_backend, mapping_source, reindex::init_reindex_metrics, SearchService},
    state::create_store,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.observability.default_filter().into());
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        "Starting {} v{}",
        config.observability.service_name,
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.prometheus_enabled {
        init_reindex_metrics();
        tracing::info!("Prometheus metrics initialized");
    }

    // Primary store
    tracing::info!("Store backend: {:?}", config.store.backend);
    let store = create_store(&config.store)?;

    // Search backend and facade
    tracing::info!(
        backend = %config.search.backend,
        alias = %config.search.alias,
        "Search backend selected"
    );
    let backend = create_backend(&config.search)?;
    let search = Arc::new(SearchService::new(
        backend,
        store.clone(),
        mapping_source(&config.search),
        config.search.clone(),
        config.reindex.clone(),
    ));

    if let Err(e) = search.initialize().await {
        tracing::warn!("Search index initialization failed: {}", e);
        tracing::warn!("Searches will fail until the alias serves an index; run a reindex");
    }

    let app = build_router(AppState::new(search.clone(), store));

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Search: http://{}/v1/search", http_addr);
    tracing::info!("   Reindex status: http://{}/v1/admin/reindex/status", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // A rebuild cut short by shutdown leaves its partial index behind otherwise.
    let reindex = &config.reindex;
    if !search
        .stop_reindex_all(reindex.stop_attempts, reindex.stop_delay_ms)
        .await
    {
        tracing::warn!("Running reindex did not stop before shutdown");
    }

    tracing::info!("Shut down gracefully");
    Ok(())
}
