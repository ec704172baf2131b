//! Startup warmup
//!
//! Calculates every user ego once, one at a time, handing control back to
//! the runtime between egos, then primes the global ranking cache.

use crate::global::GlobalRankCache;
use gravity_common::errors::{GravityError, Result};
use gravity_common::metrics;
use gravity_common::GraphAccess;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Outcome of a warmup run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarmupReport {
    /// Egos calculated successfully
    pub calculated: usize,

    /// Egos whose calculation failed
    pub failed: usize,

    /// Beacons in the primed global ranking
    pub beacons: usize,
}

/// Run the warmup after `delay`
///
/// Returns [`GravityError::Cancelled`] when shutdown is signalled before
/// it completes. Per-ego failures are logged and counted.
#[instrument(skip(access, cache, shutdown))]
pub async fn warmup(
    access: GraphAccess,
    cache: Arc<GlobalRankCache>,
    delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<WarmupReport> {
    if !delay.is_zero() {
        info!(delay_secs = delay.as_secs_f64(), "Delaying ego warmup");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => return Err(GravityError::Cancelled),
        }
    }

    let start = Instant::now();
    let egos = access.users();
    info!(egos = egos.len(), "Starting ego warmup");

    let mut report = WarmupReport::default();
    for ego in egos {
        if *shutdown.borrow() {
            warn!(calculated = report.calculated, "Ego warmup cancelled");
            return Err(GravityError::Cancelled);
        }

        match access.calculate(&ego) {
            Ok(()) => {
                report.calculated += 1;
                metrics::record_warmup_ego(true);
            }
            Err(e) => {
                report.failed += 1;
                metrics::record_warmup_ego(false);
                warn!(ego = %ego, error = %e, "Ego warmup failed");
            }
        }

        tokio::task::yield_now().await;
    }

    info!("Starting warmup for global beacons score");
    let primed = tokio::task::spawn_blocking(move || cache.get_top_beacons(None, true))
        .await
        .map_err(|e| GravityError::Internal {
            message: format!("Global ranking warmup task failed: {}", e),
        })??;
    report.beacons = primed.len();

    info!(
        calculated = report.calculated,
        failed = report.failed,
        beacons = report.beacons,
        elapsed_secs = start.elapsed().as_secs_f64(),
        "Warmup finished"
    );
    Ok(report)
}
