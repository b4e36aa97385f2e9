//! TTL Sweeper Task
//!
//! Background task that removes expired cache entries even when nobody reads them.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::info;

use crate::cache::Engine;

/// Spawns the expiry sweeper on `runtime`.
///
/// Every `interval` the task removes all expired entries. If the soonest
/// remaining deadline falls before the next tick, it sleeps until that
/// deadline (without holding the cache lock) and sweeps again, so short TTLs
/// are honoured promptly.
///
/// The task stops as soon as `shutdown` changes or its sender is dropped.
pub(crate) fn spawn_sweeper<K, V, F>(
    engine: Arc<Engine<K, V, F>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    runtime: &Handle,
) -> JoinHandle<()>
where
    K: Send + 'static,
    V: Send + 'static,
    F: Send + Sync + 'static,
{
    runtime.spawn(async move {
        info!("Starting TTL sweeper with interval of {:?}", interval);

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'sweep: loop {
            let tick = tokio::select! {
                biased;
                _ = shutdown.changed() => break 'sweep,
                tick = ticker.tick() => tick,
            };

            // Unrepresentable next tick: every deadline comes before it
            let next_tick = tick.checked_add(interval);
            let mut soonest = engine.sweep_expired(Instant::now());

            while let Some(deadline) =
                soonest.filter(|deadline| next_tick.map_or(true, |next| *deadline < next))
            {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break 'sweep,
                    _ = time::sleep_until(deadline) => {}
                }
                soonest = engine.sweep_expired(Instant::now());
            }
        }

        info!("TTL sweeper stopped");
    })
}
