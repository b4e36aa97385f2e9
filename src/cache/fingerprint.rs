//! Fingerprint Module
//!
//! Maps keys of any shape to a 64-bit fingerprint, and fingerprints to entries.
//!
//! Fingerprints are not collision resistant. Two distinct keys that produce the
//! same fingerprint address the same entry: the second write updates the first
//! key's entry in place.

use std::collections::hash_map::{DefaultHasher, RandomState};
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};

use serde::Serialize;

use crate::cache::list::EntryRef;
use crate::error::{CacheError, Result};

// == Fingerprinter ==
/// Pluggable key fingerprinting.
pub trait Fingerprinter<K: ?Sized>: Send + Sync {
    /// Computes the fingerprint of `key`, or fails if the key cannot be traversed.
    fn fingerprint(&self, key: &K) -> Result<u64>;
}

// == JSON Fingerprint ==
/// Structural fingerprint of any serializable key.
///
/// The key is encoded with `serde_json` and the bytes are hashed, so keys with
/// equal content share a fingerprint even without `Hash` or `Eq` (floats,
/// nested structs, vectors). Keys serde_json cannot encode, such as maps with
/// non-string keys, are reported as [`CacheError::Fingerprint`].
///
/// Maps are encoded in iteration order: use ordered maps for map-shaped keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFingerprint;

impl<K: Serialize + ?Sized> Fingerprinter<K> for JsonFingerprint {
    fn fingerprint(&self, key: &K) -> Result<u64> {
        let bytes = serde_json::to_vec(key).map_err(|e| CacheError::Fingerprint(e.to_string()))?;

        let mut hasher = DefaultHasher::new();
        hasher.write(&bytes);
        Ok(hasher.finish())
    }
}

// == Hash Fingerprint ==
/// Fingerprint for keys implementing `Hash`. Never fails.
#[derive(Debug, Clone, Default)]
pub struct HashFingerprint<S = RandomState> {
    build_hasher: S,
}

impl HashFingerprint {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> HashFingerprint<S> {
    pub fn with_hasher(build_hasher: S) -> Self {
        Self { build_hasher }
    }
}

impl<K, S> Fingerprinter<K> for HashFingerprint<S>
where
    K: Hash + ?Sized,
    S: BuildHasher + Send + Sync,
{
    fn fingerprint(&self, key: &K) -> Result<u64> {
        Ok(self.build_hasher.hash_one(key))
    }
}

// == Fingerprint Index ==
/// Lookup from fingerprint to the entry it addresses. Holds no entries itself.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    entries: HashMap<u64, EntryRef>,
}

impl FingerprintIndex {
    // == Constructor ==
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Returns the entry addressed by `fingerprint`.
    pub fn get(&self, fingerprint: u64) -> Option<EntryRef> {
        self.entries.get(&fingerprint).copied()
    }

    // == Contains ==
    /// Returns true if `fingerprint` addresses an entry.
    pub fn contains(&self, fingerprint: u64) -> bool {
        self.entries.contains_key(&fingerprint)
    }

    // == Insert ==
    /// Points `fingerprint` at `entry`, replacing any previous mapping.
    pub fn insert(&mut self, fingerprint: u64, entry: EntryRef) {
        self.entries.insert(fingerprint, entry);
    }

    // == Remove ==
    /// Drops the mapping for `fingerprint`.
    pub fn remove(&mut self, fingerprint: u64) -> Option<EntryRef> {
        self.entries.remove(&fingerprint)
    }

    // == Size ==
    /// Number of mapped fingerprints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Clear ==
    /// Drops every mapping.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
