//! TTL LRU Cache demo
//!
//! Runs a small workload against the cache: writes keys with and without a TTL,
//! reads a sliding window of them, and logs statistics until interrupted.

use std::env;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_lru_cache::{Cache, CacheConfig};

/// Main entry point for the cache demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache (starts the background TTL sweeper)
/// 4. Drive the workload and report stats every second
/// 5. Close the cache on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_lru_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting TTL LRU cache demo");

    let config = CacheConfig::from_env();
    let ttl = env::var("DEMO_TTL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(250));
    info!(
        "Configuration loaded: capacity={}, sweep_interval={:?}, demo_ttl={:?}",
        config.capacity, config.sweep_interval, ttl
    );

    let cache = Cache::<String, u64>::builder(config.capacity)
        .sweep_interval(config.sweep_interval)
        .on_evict(|key, value| tracing::debug!("Evicted {} = {}", key, value))
        .on_error(|err| warn!("Cache error: {}", err))
        .build()
        .context("failed to build cache")?;

    let mut writes = interval(Duration::from_millis(10));
    writes.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut report = interval(Duration::from_secs(1));
    report.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut n: u64 = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = writes.tick() => {
                let key = format!("key-{}", n);
                if n % 3 == 0 {
                    cache.add(key, n);
                } else {
                    cache.add_with_ttl(key, n, ttl);
                }
                if n >= 5 {
                    cache.get(format!("key-{}", n - 5).as_str());
                }
                n += 1;
            }
            _ = report.tick() => {
                let stats = cache.stats();
                info!(
                    "Stats: entries={}/{}, hits={}, misses={}, evictions={}, expirations={}, hit_rate={:.2}",
                    stats.total_entries,
                    stats.capacity,
                    stats.hits,
                    stats.misses,
                    stats.evictions,
                    stats.expirations,
                    stats.hit_rate()
                );
            }
        }
    }

    cache.close();
    let stats = serde_json::to_string(&cache.stats()).context("failed to encode stats")?;
    info!("Final stats: {}", stats);
    info!("Demo shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
