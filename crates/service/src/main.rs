//! Gravity Rank Service
//!
//! Hosts the rank engine and its maintenance tasks:
//! - Initial edge load and LISTEN/NOTIFY bridge from Postgres
//! - Predicate pushdown query listener
//! - Ego warmup and the zero node heartbeat

use anyhow::Context;
use gravity_common::{
    config::{AppConfig, ObservabilityConfig},
    db::{self, EdgeSource, PgEdgeSource},
    metrics::{self, COMPUTATION_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
    GraphAccess, MemoryRankEngine, NodeId, VERSION,
};
use gravity_fdw::{FdwProcessor, QueryListener};
use gravity_ranking::{warmup, GlobalRankCache, ZeroOpinionMaintainer};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let mut config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    config.validate()?;

    // Initialize tracing
    init_tracing(&config.observability);
    info!("Starting Gravity Rank Service v{}", VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        install_metrics(config.observability.metrics_port)?;
        info!(port = config.observability.metrics_port, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    let access = GraphAccess::from(Arc::new(MemoryRankEngine::default()));
    let cache = Arc::new(GlobalRankCache::with_ttl(access.clone(), config.global_cache_ttl()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    // Edge store
    if config.database.url.is_some() {
        let source = PgEdgeSource::connect(&config.database).await?;
        let edges = source.load_edges().await?;
        let applied = db::apply_edges(&access, edges);
        info!(applied, "Initial edges applied");

        if config.database.edges_channel.is_some() {
            let stream = source.notifications().await?;
            let bridge_access = access.clone();
            let rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                let applied = db::run_bridge(stream, bridge_access, rx).await;
                info!(applied, "Edge notification bridge stopped");
            }));
        }
    } else {
        warn!("database.url not set, starting with an empty graph");
    }

    // Query listener
    if config.listener.enabled {
        let listener = QueryListener::new(FdwProcessor::new(access.clone()), config.listener.max_messages);
        let addr = config.listener.addr.clone();
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = listener.run(&addr, rx).await {
                error!(addr = %addr, error = %e, "Query listener failed");
            }
        }));
    }

    // Warmup, then the zero heartbeat
    let zero = match config.rank.zero_node.as_deref().map(NodeId::parse).transpose() {
        Ok(zero) => zero,
        Err(e) => {
            error!(error = %e, "Invalid zero node, heartbeat disabled");
            None
        }
    };
    if config.rank.ego_warmup || zero.is_some() {
        let maintainer = ZeroOpinionMaintainer::new(access.clone(), cache.clone());
        let run_warmup = config.rank.ego_warmup;
        let delay = config.warmup_delay();
        let period = config.heartbeat_period();
        let limit = config.rank.top_nodes_limit;
        let access = access.clone();
        let cache = cache.clone();
        let rx = shutdown_rx.clone();

        tasks.push(tokio::spawn(async move {
            if run_warmup {
                match warmup(access, cache, delay, rx.clone()).await {
                    Ok(report) => info!(
                        calculated = report.calculated,
                        failed = report.failed,
                        beacons = report.beacons,
                        "Ego warmup complete"
                    ),
                    Err(e) => warn!(error = %e, "Ego warmup did not complete"),
                }
            }

            if let Some(zero) = zero {
                maintainer.run_heartbeat(zero, limit, period, rx).await;
            }
        }));
    }

    info!("Gravity Rank Service ready");
    shutdown_signal().await;

    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Task failed during shutdown");
        }
    }

    info!("Gravity Rank Service shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_global_rank_duration_seconds", METRICS_PREFIX)),
            COMPUTATION_BUCKETS,
        )?
        .set_buckets_for_metric(Matcher::Full(format!("{}_view_duration_seconds", METRICS_PREFIX)), LATENCY_BUCKETS)?
        .set_buckets_for_metric(Matcher::Full(format!("{}_fdw_duration_seconds", METRICS_PREFIX)), LATENCY_BUCKETS)?
        .install()
        .context("Failed to install Prometheus exporter")?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
