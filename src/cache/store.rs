//! Cache Store Module
//!
//! The entry-management core: a recency list owning the entries, a fingerprint
//! index and a TTL index pointing into it. No locking happens here; callers
//! pass the key fingerprint and the current instant.

use std::time::Duration;

use tokio::time::Instant;

use crate::cache::entry::{Entry, Expiry};
use crate::cache::fingerprint::FingerprintIndex;
use crate::cache::list::{EntryRef, Iter, RecencyList};
use crate::cache::stats::CacheStats;
use crate::cache::ttl_index::TtlIndex;
use crate::error::{CacheError, Result};

// == Lookup ==
/// Outcome of [`CacheStore::get`].
#[derive(Debug)]
pub enum Lookup<'a, K, V> {
    /// Live entry, now the most recently used
    Hit(&'a V),
    /// The entry had expired and was removed
    Expired(Entry<K, V>),
    Miss,
}

// == Cache Store ==
/// Bounded LRU storage with optional per-entry TTL.
#[derive(Debug)]
pub struct CacheStore<K, V> {
    list: RecencyList<K, V>,
    index: FingerprintIndex,
    ttl: TtlIndex,
    stats: CacheStats,
    capacity: usize,
}

impl<K, V> CacheStore<K, V> {
    // == Constructor ==
    /// Creates an empty store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidCapacity(capacity));
        }

        Ok(Self {
            list: RecencyList::new(),
            index: FingerprintIndex::new(),
            ttl: TtlIndex::new(),
            stats: CacheStats::new(capacity),
            capacity,
        })
    }

    // == Add ==
    /// Inserts or updates an entry without touching its TTL.
    ///
    /// An existing entry keeps its expiry unless it has already expired, in
    /// which case it comes back without a TTL. Returns the entry evicted to stay
    /// within capacity, if any.
    pub fn add(&mut self, fingerprint: u64, key: K, value: V, now: Instant) -> Option<Entry<K, V>> {
        let Some(existing) = self.index.get(fingerprint) else {
            return self.insert_new(fingerprint, key, value, Expiry::Never);
        };

        self.list.move_to_front(existing);
        let revived = match self.list.get_mut(existing) {
            Some(entry) => {
                entry.value = value;
                let expired = entry.is_expired(now);
                if expired {
                    entry.expires_at = Expiry::Never;
                }
                expired
            }
            None => false,
        };
        if revived {
            self.ttl.remove(existing);
        }
        None
    }

    // == Add With TTL ==
    /// Inserts or updates an entry that expires `ttl` after `now`.
    ///
    /// A zero `ttl` does nothing. Returns the entry evicted to stay within
    /// capacity, if any.
    pub fn add_with_ttl(
        &mut self,
        fingerprint: u64,
        key: K,
        value: V,
        ttl: Duration,
        now: Instant,
    ) -> Option<Entry<K, V>> {
        if ttl.is_zero() {
            return None;
        }

        let expires_at = Expiry::after(now, ttl);
        let Some(existing) = self.index.get(fingerprint) else {
            return self.insert_new(fingerprint, key, value, expires_at);
        };

        self.list.move_to_front(existing);
        if let Some(entry) = self.list.get_mut(existing) {
            entry.value = value;
            entry.expires_at = expires_at;
        }
        self.ttl.remove(existing);
        if let Some(deadline) = expires_at.deadline() {
            self.ttl.insert_sorted(existing, deadline);
        }
        None
    }

    // == Get ==
    /// Looks up an entry, promoting it on a hit and removing it if expired.
    pub fn get(&mut self, fingerprint: u64, now: Instant) -> Lookup<'_, K, V> {
        let state = self
            .index
            .get(fingerprint)
            .and_then(|entry| self.list.get(entry).map(|e| (entry, e.is_expired(now))));

        match state {
            Some((entry, false)) => {
                self.list.move_to_front(entry);
                self.stats.record_hit();
                match self.list.get(entry) {
                    Some(e) => Lookup::Hit(&e.value),
                    None => Lookup::Miss,
                }
            }
            Some((entry, true)) => {
                self.stats.record_miss();
                match self.unlink(entry) {
                    Some(expired) => {
                        self.stats.record_expirations(1);
                        Lookup::Expired(expired)
                    }
                    None => Lookup::Miss,
                }
            }
            None => {
                self.stats.record_miss();
                Lookup::Miss
            }
        }
    }

    // == Peek ==
    /// Returns the value without promoting it or checking its expiry.
    pub fn peek(&self, fingerprint: u64) -> Option<&V> {
        self.index
            .get(fingerprint)
            .and_then(|entry| self.list.get(entry))
            .map(Entry::value)
    }

    // == Contains ==
    /// Presence in the index only; expiry is not checked.
    pub fn contains(&self, fingerprint: u64) -> bool {
        self.index.contains(fingerprint)
    }

    // == Remove ==
    pub fn remove(&mut self, fingerprint: u64) -> Option<Entry<K, V>> {
        let entry = self.index.get(fingerprint)?;
        self.unlink(entry)
    }

    // == Remove Expired ==
    /// Removes every entry whose deadline is at or before `now`.
    ///
    /// Walks the TTL index from its soonest end and stops at the first live entry.
    pub fn remove_expired(&mut self, now: Instant) -> Vec<Entry<K, V>> {
        let mut expired = Vec::new();
        while let Some(entry) = self.ttl.pop_expired(now) {
            if let Some(removed) = self.detach(entry) {
                expired.push(removed);
            }
        }

        self.stats.record_expirations(expired.len());
        expired
    }

    // == Clear ==
    /// Removes every entry, most recently used first.
    pub fn clear(&mut self) -> Vec<Entry<K, V>> {
        self.index.clear();
        self.ttl.clear();
        let drained = self.list.drain();
        self.stats.set_total_entries(0);
        drained
    }

    /// Deadline of the soonest-expiring entry.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.ttl.soonest()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries carrying a TTL.
    pub fn ttl_len(&self) -> usize {
        self.ttl.len()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.list.len());
        stats
    }

    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.list.iter()
    }

    fn insert_new(&mut self, fingerprint: u64, key: K, value: V, expires_at: Expiry) -> Option<Entry<K, V>> {
        let entry = self.list.push_front(fingerprint, key, value, expires_at);
        self.index.insert(fingerprint, entry);
        if let Some(deadline) = expires_at.deadline() {
            self.ttl.insert_sorted(entry, deadline);
        }

        let evicted = if self.list.len() > self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.stats.set_total_entries(self.list.len());
        evicted
    }

    fn evict_oldest(&mut self) -> Option<Entry<K, V>> {
        let oldest = self.list.last()?;
        let evicted = self.unlink(oldest)?;
        self.stats.record_eviction();
        Some(evicted)
    }

    /// Removes an entry from all three structures.
    fn unlink(&mut self, entry: EntryRef) -> Option<Entry<K, V>> {
        let has_deadline = self
            .list
            .get(entry)
            .is_some_and(|e| e.expires_at.deadline().is_some());
        if has_deadline {
            self.ttl.remove(entry);
        }
        self.detach(entry)
    }

    /// Removes an entry from the recency list and the fingerprint index.
    /// Used directly by the sweep, which has already popped the TTL slot.
    fn detach(&mut self, entry: EntryRef) -> Option<Entry<K, V>> {
        let removed = self.list.remove(entry)?;
        self.index.remove(removed.fingerprint);
        self.stats.set_total_entries(self.list.len());
        Some(removed)
    }

    /// Panics if the three structures disagree.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.list.len(), self.index.len(), "list and index sizes differ");
        assert_eq!(self.list.len(), self.list.iter().count(), "list length is stale");
        assert!(self.list.len() <= self.capacity, "capacity exceeded");
        assert!(self.ttl.is_sorted(), "ttl index out of order");

        for entry in self.list.iter() {
            let indexed = self
                .index
                .get(entry.fingerprint)
                .and_then(|r| self.list.get(r))
                .map(Entry::fingerprint);
            assert_eq!(indexed, Some(entry.fingerprint), "entry missing from index");
        }

        let with_deadline = self
            .list
            .iter()
            .filter(|e| e.expires_at.deadline().is_some())
            .count();
        assert_eq!(self.ttl.len(), with_deadline, "ttl index does not match entries");
        for (r, deadline) in self.ttl.iter() {
            let entry = self.list.get(r).expect("ttl index points at a removed entry");
            assert_eq!(entry.expires_at, Expiry::At(deadline));
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_secs(3600);

    fn fp(key: &str) -> u64 {
        key.bytes().fold(0xcbf29ce484222325, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3))
    }

    fn add(store: &mut CacheStore<String, i32>, key: &str, value: i32, now: Instant) -> Option<String> {
        store
            .add(fp(key), key.to_string(), value, now)
            .map(|evicted| evicted.into_parts().0)
    }

    fn get(store: &mut CacheStore<String, i32>, key: &str, now: Instant) -> Option<i32> {
        match store.get(fp(key), now) {
            Lookup::Hit(value) => Some(*value),
            _ => None,
        }
    }

    fn keys(store: &CacheStore<String, i32>) -> Vec<String> {
        store.iter().map(|e| e.key().clone()).collect()
    }

    #[test]
    fn test_store_rejects_zero_capacity() {
        let result = CacheStore::<String, i32>::new(0);
        assert!(matches!(result, Err(CacheError::InvalidCapacity(0))));
    }

    #[test]
    fn test_store_add_and_peek() {
        let mut store = CacheStore::new(2).unwrap();
        let now = Instant::now();

        add(&mut store, "1", 1, now);
        assert_eq!(store.peek(fp("1")), Some(&1));
        add(&mut store, "2", 2, now);
        assert_eq!(store.peek(fp("2")), Some(&2));

        add(&mut store, "3", 3, now);
        assert!(!store.contains(fp("1")));

        add(&mut store, "2", 4, now);
        assert_eq!(store.peek(fp("2")), Some(&4));
        store.assert_consistent();
    }

    #[test]
    fn test_store_capacity_evicts_least_recent() {
        let mut store = CacheStore::new(3).unwrap();
        let now = Instant::now();

        assert_eq!(add(&mut store, "1", 1, now), None);
        assert_eq!(add(&mut store, "2", 2, now), None);
        assert_eq!(add(&mut store, "3", 3, now), None);
        assert_eq!(add(&mut store, "4", 4, now), Some("1".to_string()));

        assert_eq!(store.len(), 3);
        assert_eq!(store.stats().evictions, 1);
        store.assert_consistent();
    }

    #[test]
    fn test_store_get_promotes() {
        let mut store = CacheStore::new(2).unwrap();
        let now = Instant::now();

        add(&mut store, "1", 1, now);
        add(&mut store, "2", 2, now);
        assert_eq!(add(&mut store, "3", 3, now), Some("1".to_string()));

        assert_eq!(get(&mut store, "2", now), Some(2));
        assert_eq!(add(&mut store, "4", 4, now), Some("3".to_string()));
        assert_eq!(keys(&store), vec!["4", "2"]);
    }

    #[test]
    fn test_store_peek_does_not_promote() {
        let mut store = CacheStore::new(2).unwrap();
        let now = Instant::now();

        add(&mut store, "1", 1, now);
        add(&mut store, "2", 2, now);
        store.peek(fp("1"));

        assert_eq!(add(&mut store, "3", 3, now), Some("1".to_string()));
    }

    #[test]
    fn test_store_duplicate_add_updates_in_place() {
        let mut store = CacheStore::new(2).unwrap();
        let now = Instant::now();

        add(&mut store, "1", 1, now);
        add(&mut store, "1", 2, now);

        assert_eq!(store.len(), 1);
        assert_eq!(get(&mut store, "1", now), Some(2));
    }

    #[test]
    fn test_store_lazy_expiry_on_get() {
        let mut store = CacheStore::new(2).unwrap();
        let now = Instant::now();

        store.add_with_ttl(fp("1"), "1".to_string(), 1, Duration::from_millis(5), now);
        assert_eq!(get(&mut store, "1", now), Some(1));

        let later = now + Duration::from_millis(7);
        match store.get(fp("1"), later) {
            Lookup::Expired(entry) => assert_eq!(entry.into_parts(), ("1".to_string(), 1)),
            other => panic!("expected expired entry, got {:?}", other),
        }

        assert!(store.is_empty());
        assert_eq!(store.ttl_len(), 0);
        assert_eq!(store.stats().expirations, 1);
        store.assert_consistent();
    }

    #[test]
    fn test_store_peek_ignores_expiry() {
        let mut store = CacheStore::new(2).unwrap();
        let now = Instant::now();

        store.add_with_ttl(fp("1"), "1".to_string(), 1, Duration::from_millis(5), now);

        // Still indexed until someone reads or sweeps it
        assert_eq!(store.peek(fp("1")), Some(&1));
        assert!(store.contains(fp("1")));
    }

    #[test]
    fn test_store_zero_ttl_is_noop() {
        let mut store = CacheStore::new(2).unwrap();
        let now = Instant::now();

        store.add_with_ttl(fp("1"), "1".to_string(), 1, Duration::ZERO, now);
        assert!(!store.contains(fp("1")));

        add(&mut store, "2", 2, now);
        store.add_with_ttl(fp("2"), "2".to_string(), 20, Duration::ZERO, now);
        assert_eq!(store.peek(fp("2")), Some(&2));
    }

    #[test]
    fn test_store_ttl_update_resorts_index() {
        let mut store = CacheStore::new(3).unwrap();
        let now = Instant::now();

        store.add_with_ttl(fp("1"), "1".to_string(), 1, Duration::from_millis(100), now);
        store.add_with_ttl(fp("2"), "2".to_string(), 2, Duration::from_secs(2), now);
        store.add_with_ttl(fp("1"), "1".to_string(), 1, Duration::from_secs(10), now);

        assert_eq!(store.next_expiry(), Some(now + Duration::from_secs(2)));
        store.assert_consistent();

        let removed = store.remove_expired(now + Duration::from_millis(120));
        assert!(removed.is_empty());
        assert_eq!(get(&mut store, "1", now + Duration::from_millis(120)), Some(1));
    }

    #[test]
    fn test_store_ttl_added_to_plain_entry() {
        let mut store = CacheStore::new(3).unwrap();
        let now = Instant::now();

        add(&mut store, "1", 1, now);
        assert_eq!(store.ttl_len(), 0);

        store.add_with_ttl(fp("1"), "1".to_string(), 2, Duration::from_millis(5), now);
        assert_eq!(store.ttl_len(), 1);

        let removed = store.remove_expired(now + Duration::from_millis(5));
        assert_eq!(removed.len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_add_keeps_ttl_of_live_entry() {
        let mut store = CacheStore::new(3).unwrap();
        let now = Instant::now();

        store.add_with_ttl(fp("1"), "1".to_string(), 1, Duration::from_millis(5), now);
        add(&mut store, "1", 2, now);

        assert_eq!(store.ttl_len(), 1);
        assert_eq!(store.remove_expired(now + Duration::from_millis(5)).len(), 1);
    }

    #[test]
    fn test_store_add_revives_expired_entry() {
        let mut store = CacheStore::new(3).unwrap();
        let now = Instant::now();
        let later = now + Duration::from_millis(10);

        store.add_with_ttl(fp("1"), "1".to_string(), 1, Duration::from_millis(5), now);
        add(&mut store, "1", 2, later);

        assert_eq!(store.ttl_len(), 0);
        assert_eq!(get(&mut store, "1", later + LONG), Some(2));
        store.assert_consistent();
    }

    #[test]
    fn test_store_remove_expired_suffix() {
        let mut store = CacheStore::new(5).unwrap();
        let now = Instant::now();

        for (i, key) in ["1", "2", "3"].iter().enumerate() {
            let ttl = Duration::from_millis(5 * (i as u64 + 1));
            store.add_with_ttl(fp(key), key.to_string(), i as i32, ttl, now);
        }
        add(&mut store, "plain", 9, now);

        let removed: Vec<String> = store
            .remove_expired(now + Duration::from_millis(10))
            .into_iter()
            .map(|e| e.into_parts().0)
            .collect();

        assert_eq!(removed, vec!["1", "2"]);
        assert_eq!(keys(&store), vec!["plain", "3"]);
        assert_eq!(store.next_expiry(), Some(now + Duration::from_millis(15)));
        store.assert_consistent();
    }

    #[test]
    fn test_store_capacity_eviction_drops_ttl_slot() {
        let mut store = CacheStore::new(2).unwrap();
        let now = Instant::now();

        store.add_with_ttl(fp("1"), "1".to_string(), 1, Duration::from_secs(5), now);
        store.add_with_ttl(fp("2"), "2".to_string(), 2, Duration::from_secs(2), now);
        let evicted = store.add_with_ttl(fp("3"), "3".to_string(), 3, Duration::from_secs(4), now);

        assert_eq!(evicted.map(|e| e.into_parts().0), Some("1".to_string()));
        assert_eq!(store.ttl_len(), 2);
        assert_eq!(get(&mut store, "1", now), None);
        store.assert_consistent();
    }

    #[test]
    fn test_store_remove() {
        let mut store = CacheStore::new(2).unwrap();
        let now = Instant::now();

        assert!(store.remove(fp("1")).is_none());

        store.add_with_ttl(fp("1"), "1".to_string(), 1, LONG, now);
        let removed = store.remove(fp("1")).map(|e| e.into_parts().1);
        assert_eq!(removed, Some(1));
        assert_eq!(store.ttl_len(), 0);

        add(&mut store, "1", 10, now);
        assert_eq!(store.peek(fp("1")), Some(&10));
        store.assert_consistent();
    }

    #[test]
    fn test_store_clear() {
        let mut store = CacheStore::new(5).unwrap();
        let now = Instant::now();

        store.add_with_ttl(fp("1"), "1".to_string(), 1, LONG, now);
        add(&mut store, "2", 2, now);

        let cleared: Vec<String> = store.clear().into_iter().map(|e| e.into_parts().0).collect();
        assert_eq!(cleared, vec!["2", "1"]);
        assert!(store.is_empty());
        assert_eq!(store.ttl_len(), 0);
        assert!(store.next_expiry().is_none());
        store.assert_consistent();
    }

    #[test]
    fn test_store_fingerprint_collision_shares_entry() {
        let mut store = CacheStore::new(2).unwrap();
        let now = Instant::now();

        store.add(1, "first".to_string(), 1, now);
        store.add(1, "second".to_string(), 2, now);

        assert_eq!(store.len(), 1);
        assert_eq!(keys(&store), vec!["first"]);
        assert_eq!(store.peek(1), Some(&2));
    }

    #[test]
    fn test_store_stats() {
        let mut store = CacheStore::new(2).unwrap();
        let now = Instant::now();

        add(&mut store, "1", 1, now);
        get(&mut store, "1", now);
        get(&mut store, "missing", now);

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.capacity, 2);
    }
}
