//! Cache Module
//!
//! Provides in-memory caching with LRU eviction and per-entry TTL expiration.

mod engine;
mod entry;
mod fingerprint;
mod list;
mod stats;
mod store;
mod ttl_index;


// Re-export public types
pub use engine::{Cache, CacheBuilder, ErrorCallback, EvictCallback};
pub use entry::{Entry, Expiry};
pub use fingerprint::{FingerprintIndex, Fingerprinter, HashFingerprint, JsonFingerprint};
pub use list::{EntryRef, Iter, RecencyList};
pub use stats::CacheStats;
pub use store::{CacheStore, Lookup};
pub use ttl_index::TtlIndex;

pub(crate) use engine::Engine;
