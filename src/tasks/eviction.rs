//! LRU Eviction Task
//!
//! Background task that removes least recently used entries until a store's
//! tracked size drops below a target.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::store::{EvictStep, StoreInner};

/// Kind of eviction pass, selecting its target size and throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPass {
    /// A write pushed the store over capacity: evict down to the exhaustion threshold
    Exhausted,
    /// Timer driven trim down to the periodic threshold
    Periodic,
}

/// Spawns the eviction task for a store.
///
/// The task waits on three sources: queued passes (`Exhausted` triggers from
/// writes, coalesced by the capacity-one channel), the periodic timer, and the
/// shutdown token. It holds only a weak reference so it ends with the store.
///
/// # Arguments
/// * `store` - Weak handle to the store internals
/// * `triggers` - Receiving side of the capacity-one trigger queue
/// * `shutdown` - Cancelled by `DiskStore::close` or when the store is dropped
/// * `period` - Interval between periodic passes
pub(crate) fn spawn_eviction_task(
    store: Weak<StoreInner>,
    mut triggers: mpsc::Receiver<EvictionPass>,
    shutdown: CancellationToken,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(period_secs = period.as_secs(), "Starting disk cache eviction");

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let pass = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(pass) = triggers.recv() => pass,
                _ = ticker.tick() => EvictionPass::Periodic,
            };

            let Some(store) = store.upgrade() else {
                break;
            };
            run_pass(&store, pass, &shutdown).await;
        }

        debug!("Shutting down disk cache eviction");
    })
}

/// Evicts until the size estimate is under the pass target.
///
/// Stops early when the index runs dry or shutdown is requested; each step
/// is independent, so an interrupted pass needs no cleanup.
async fn run_pass(store: &StoreInner, pass: EvictionPass, shutdown: &CancellationToken) {
    let (target, throttle) = match pass {
        EvictionPass::Exhausted => (store.config.exhaustion_target(), store.config.fast_throttle),
        EvictionPass::Periodic => (store.config.periodic_target(), store.config.slow_throttle),
    };
    let target = target as i64;

    let started = Instant::now();
    let mut evicted = 0u64;
    let mut freed = 0u64;

    while store.size_bytes() > 0 && store.size_bytes() >= target {
        if shutdown.is_cancelled() {
            debug!("Eviction pass interrupted by shutdown");
            return;
        }

        match store.evict_oldest().await {
            EvictStep::Evicted(bytes) => {
                evicted += 1;
                freed += bytes;
            }
            EvictStep::Missing => {}
            EvictStep::Failed => {
                warn!(
                    size_bytes = store.size_bytes(),
                    target,
                    "Could not delete a cache file, stopping eviction pass"
                );
                break;
            }
            EvictStep::Empty => {
                warn!(
                    size_bytes = store.size_bytes(),
                    target,
                    "Size estimate above target but nothing left to evict"
                );
                break;
            }
        }

        if !throttle.is_zero() {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(throttle) => {}
            }
        }
    }

    if evicted > 0 {
        info!(
            ?pass,
            evicted,
            freed_bytes = freed,
            size_bytes = store.size_bytes(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Eviction pass complete"
        );
    } else {
        debug!(?pass, size_bytes = store.size_bytes(), "Eviction pass found nothing to do");
    }
}
