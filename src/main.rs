//! feed-geoblock - Feed geoblocking pipeline with Hexagonal Architecture
//!
//! This is the composition root that wires together all the components.

use feed_geoblock::adapters::inbound::ProviderPeer;
use feed_geoblock::adapters::outbound::{
    BroadcastBus, DashMapLocationCache, HttpLocationProvider, MemoryFeedDom, CONTENT_CONTEXT,
    PAGE_CONTEXT,
};
use feed_geoblock::application::{FeedFilterService, PipelineRuntime, PipelineState};
use feed_geoblock::config::load_config;
use feed_geoblock::infrastructure::{shutdown_signal, ConfigBridge, ShutdownController};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

/// Per-request timeout of the HTTP provider, well inside the dispatch timeout.
const PROVIDER_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting feed-geoblock provider={} blocked={:?}",
        cfg.provider_url,
        cfg.blocked_countries
    );

    // ===== COMPOSITION ROOT =====
    // Wire up all adapters and services

    let shutdown = ShutdownController::new();
    let bus = BroadcastBus::default();

    // 1. Page side: HTTP provider answering over the bus
    let provider = Arc::new(HttpLocationProvider::with_timeout(
        cfg.provider_url.clone(),
        cfg.default_wait(),
        PROVIDER_REQUEST_TIMEOUT,
    )?);
    let (page_tx, page_rx) = bus.endpoint(PAGE_CONTEXT, CONTENT_CONTEXT);
    let peer = ProviderPeer::new(provider, page_tx, page_rx, shutdown.clone()).spawn();

    // 2. Feed document, seeded before observation so the initial scan covers it
    let dom = Arc::new(MemoryFeedDom::new());
    if let Some(path) = &cfg.feed_path {
        let nodes = dom.load_snapshot_file(path)?;
        tracing::info!("loaded {} feed nodes from {}", nodes.len(), path);
    }
    let mutations = dom.observe();

    // 3. Content side: cache, settings and the pipeline itself
    let cache = Arc::new(DashMapLocationCache::new(cfg.cache_ttl()));
    let bridge = Arc::new(ConfigBridge::new(cfg.filter_settings()));
    let (content_tx, content_rx) = bus.endpoint(CONTENT_CONTEXT, PAGE_CONTEXT);

    let service = FeedFilterService::new(
        dom.clone(),
        cache,
        Arc::new(content_tx),
        PipelineState::new(&cfg.filter_settings(), cfg.queue_config()),
    );
    let runtime =
        PipelineRuntime::new(service, mutations, content_rx, bridge, shutdown.clone()).spawn();

    // 4. Run until a signal arrives
    shutdown_signal(shutdown).await;

    if let Err(e) = runtime.await {
        tracing::error!("pipeline task failed: {:?}", e);
    }
    if let Err(e) = peer.await {
        tracing::error!("provider task failed: {:?}", e);
    }

    tracing::info!("stopped, {} posts hidden", dom.hidden_posts().len());
    Ok(())
}
