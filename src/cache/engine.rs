//! Cache Engine Module
//!
//! Thread-safe cache handle: one lock around the store, key fingerprinting,
//! notifications, and the background expiry sweeper.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::entry::Entry;
use crate::cache::fingerprint::{Fingerprinter, JsonFingerprint};
use crate::cache::stats::CacheStats;
use crate::cache::store::{CacheStore, Lookup};
use crate::config::{CacheConfig, DEFAULT_SWEEP_INTERVAL};
use crate::error::{CacheError, Result};
use crate::tasks::spawn_sweeper;

/// Called with the key and value of every entry removed by capacity
/// eviction, expiry or `clear`. Runs under the cache lock: it must not call
/// back into the same cache.
pub type EvictCallback<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

/// Called when a key cannot be fingerprinted.
pub type ErrorCallback = Box<dyn Fn(&CacheError) + Send + Sync>;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

// == Engine ==
/// State shared between cache handles and the sweeper.
pub(crate) struct Engine<K, V, F> {
    store: Mutex<CacheStore<K, V>>,
    fingerprinter: F,
    on_evict: Option<EvictCallback<K, V>>,
    on_error: Option<ErrorCallback>,
}

impl<K, V, F> Engine<K, V, F> {
    fn notify(&self, entry: &Entry<K, V>) {
        if let Some(on_evict) = &self.on_evict {
            on_evict(entry.key(), entry.value());
        }
    }

    fn fingerprint<Q>(&self, key: &Q) -> Option<u64>
    where
        Q: ?Sized,
        F: Fingerprinter<Q>,
    {
        match self.fingerprinter.fingerprint(key) {
            Ok(fingerprint) => Some(fingerprint),
            Err(err) => {
                warn!("Treating key as absent: {}", err);
                if let Some(on_error) = &self.on_error {
                    on_error(&err);
                }
                None
            }
        }
    }

    /// Removes every entry expired at `now` and returns the next deadline.
    pub(crate) fn sweep_expired(&self, now: Instant) -> Option<Instant> {
        let mut store = self.store.lock();
        let expired = store.remove_expired(now);
        for entry in &expired {
            self.notify(entry);
        }

        if !expired.is_empty() {
            debug!("TTL sweep: removed {} expired entries", expired.len());
        }
        store.next_expiry()
    }
}

// == Cache ==
/// Bounded LRU cache with optional per-entry TTL, safe to share between threads.
///
/// Keys only need to be fingerprintable: with the default [`JsonFingerprint`]
/// any `Serialize` type works, including floats and nested structures.
///
/// Expired entries are removed lazily by [`get`](Cache::get) and actively by
/// a sweeper task running on the Tokio runtime the cache was built in.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ttl_lru_cache::Cache;
///
/// # #[tokio::main]
/// # async fn main() -> ttl_lru_cache::Result<()> {
/// let cache = Cache::new(2, None)?;
///
/// cache.add("a", 1);
/// cache.add_with_ttl("b", 2, Duration::from_secs(60));
/// cache.add("c", 3);
///
/// assert_eq!(cache.get("a"), None);
/// assert_eq!(cache.get("b"), Some(2));
/// cache.close();
/// # Ok(())
/// # }
/// ```
pub struct Cache<K, V, F = JsonFingerprint> {
    engine: Arc<Engine<K, V, F>>,
    capacity: usize,
    shutdown: watch::Sender<bool>,
    sweeper: JoinHandle<()>,
}

impl<K, V> Cache<K, V, JsonFingerprint>
where
    K: Serialize + Send + 'static,
    V: Send + 'static,
{
    // == Constructor ==
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(capacity: usize, on_evict: Option<EvictCallback<K, V>>) -> Result<Self> {
        let mut builder = CacheBuilder::new(capacity);
        builder.on_evict = on_evict;
        builder.build()
    }

    /// Creates a cache from loaded configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        CacheBuilder::new(config.capacity)
            .sweep_interval(config.sweep_interval)
            .build()
    }
}

impl<K, V> Cache<K, V, JsonFingerprint> {
    pub fn builder(capacity: usize) -> CacheBuilder<K, V> {
        CacheBuilder::new(capacity)
    }
}

impl<K, V, F> Cache<K, V, F>
where
    F: Fingerprinter<K>,
{
    // == Add ==
    /// Inserts or updates `key` and marks it most recently used.
    ///
    /// An existing entry keeps its TTL. If the cache grows past capacity, the
    /// least recently used entry is evicted.
    pub fn add(&self, key: K, value: V) {
        let Some(fingerprint) = self.engine.fingerprint(&key) else {
            return;
        };

        let mut store = self.engine.store.lock();
        if let Some(evicted) = store.add(fingerprint, key, value, Instant::now()) {
            debug!("Capacity reached, evicted least recently used entry");
            self.engine.notify(&evicted);
        }
    }

    // == Add With TTL ==
    /// Inserts or updates `key` so that it expires after `ttl`.
    ///
    /// A zero `ttl` is ignored: nothing is inserted or updated.
    pub fn add_with_ttl(&self, key: K, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let Some(fingerprint) = self.engine.fingerprint(&key) else {
            return;
        };

        let mut store = self.engine.store.lock();
        if let Some(evicted) = store.add_with_ttl(fingerprint, key, value, ttl, Instant::now()) {
            debug!("Capacity reached, evicted least recently used entry");
            self.engine.notify(&evicted);
        }
    }
}

impl<K, V, F> Cache<K, V, F> {
    // == Get ==
    /// Returns the value for `key` and marks it most recently used.
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        F: Fingerprinter<Q>,
        V: Clone,
    {
        let fingerprint = self.engine.fingerprint(key)?;

        let mut store = self.engine.store.lock();
        match store.get(fingerprint, Instant::now()) {
            Lookup::Hit(value) => Some(value.clone()),
            Lookup::Expired(entry) => {
                self.engine.notify(&entry);
                None
            }
            Lookup::Miss => None,
        }
    }

    // == Peek ==
    /// Returns the value for `key` without touching recency or checking expiry.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        F: Fingerprinter<Q>,
        V: Clone,
    {
        let fingerprint = self.engine.fingerprint(key)?;
        self.engine.store.lock().peek(fingerprint).cloned()
    }

    // == Contains ==
    /// Returns true if `key` is stored, expired or not.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        F: Fingerprinter<Q>,
    {
        self.engine
            .fingerprint(key)
            .is_some_and(|fingerprint| self.engine.store.lock().contains(fingerprint))
    }

    // == Remove ==
    /// Removes `key`, returning its value. Does not invoke the eviction callback.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        F: Fingerprinter<Q>,
    {
        let fingerprint = self.engine.fingerprint(key)?;
        let removed = self.engine.store.lock().remove(fingerprint);
        removed.map(|entry| entry.into_parts().1)
    }

    // == Clear ==
    /// Removes every entry, notifying the eviction callback for each.
    pub fn clear(&self) {
        let mut store = self.engine.store.lock();
        let cleared = store.clear();
        for entry in &cleared {
            self.engine.notify(entry);
        }
        debug!("Cache cleared: removed {} entries", cleared.len());
    }

    pub fn len(&self) -> usize {
        self.engine.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engine.store.lock().is_empty()
    }

    /// Maximum number of entries.
    pub fn cap(&self) -> usize {
        self.capacity
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.engine.store.lock().stats()
    }

    // == Close ==
    /// Signals the sweeper to stop. Returns immediately; safe to call twice.
    ///
    /// The cache stays usable afterwards, but expired entries are then only
    /// removed lazily by `get`.
    pub fn close(&self) {
        if !self.shutdown.send_replace(true) {
            info!("Cache closed, stopping TTL sweeper");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Returns true until the sweeper task has exited.
    pub fn sweeper_running(&self) -> bool {
        !self.sweeper.is_finished()
    }
}

impl<K, V, F> fmt::Debug for Cache<K, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<K, V, F> Drop for Cache<K, V, F> {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

// == Builder ==
/// Configures and builds a [`Cache`].
pub struct CacheBuilder<K, V, F = JsonFingerprint> {
    capacity: usize,
    sweep_interval: Duration,
    fingerprinter: F,
    on_evict: Option<EvictCallback<K, V>>,
    on_error: Option<ErrorCallback>,
    runtime: Option<Handle>,
}

impl<K, V> CacheBuilder<K, V, JsonFingerprint> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            fingerprinter: JsonFingerprint,
            on_evict: None,
            on_error: None,
            runtime: None,
        }
    }
}

impl<K, V, F> CacheBuilder<K, V, F> {
    /// Fixed interval between background sweeps. Clamped to between 1ms and
    /// one day; entries expiring between ticks are still swept at their deadline.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL);
        self
    }

    pub fn on_evict(mut self, on_evict: impl Fn(&K, &V) + Send + Sync + 'static) -> Self {
        self.on_evict = Some(Box::new(on_evict));
        self
    }

    pub fn on_error(mut self, on_error: impl Fn(&CacheError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Runtime hosting the sweeper. Defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Replaces the key fingerprinting strategy.
    pub fn fingerprinter<G>(self, fingerprinter: G) -> CacheBuilder<K, V, G> {
        CacheBuilder {
            capacity: self.capacity,
            sweep_interval: self.sweep_interval,
            fingerprinter,
            on_evict: self.on_evict,
            on_error: self.on_error,
            runtime: self.runtime,
        }
    }

    // == Build ==
    pub fn build(self) -> Result<Cache<K, V, F>>
    where
        K: Send + 'static,
        V: Send + 'static,
        F: Fingerprinter<K> + 'static,
    {
        let store = CacheStore::new(self.capacity)?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| CacheError::NoRuntime)?,
        };

        let engine = Arc::new(Engine {
            store: Mutex::new(store),
            fingerprinter: self.fingerprinter,
            on_evict: self.on_evict,
            on_error: self.on_error,
        });

        let (shutdown, stop) = watch::channel(false);
        let sweeper = spawn_sweeper(engine.clone(), self.sweep_interval, stop, &runtime);

        Ok(Cache {
            engine,
            capacity: self.capacity,
            shutdown,
            sweeper,
        })
    }
}
