//! TTL LRU Cache - A bounded in-process cache
//!
//! Combines Least-Recently-Used capacity eviction with optional per-entry
//! Time-To-Live expiration, safe for concurrent use.

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{Cache, CacheBuilder, CacheStats, HashFingerprint, JsonFingerprint};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
