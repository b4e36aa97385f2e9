//! Cache Entry Module
//!
//! Defines the unit of storage and its expiry state.

use std::time::Duration;

use tokio::time::Instant;

// == Expiry ==
/// When an entry stops being served.
///
/// `Never` replaces a far-future timestamp, so comparisons need no magic constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The entry only leaves through eviction or removal
    Never,
    /// The entry expires at this instant
    At(Instant),
}

impl Expiry {
    // == Constructor ==
    /// Computes the expiry for a TTL starting at `now`.
    ///
    /// A deadline that does not fit in an `Instant` is treated as `Never`.
    pub fn after(now: Instant, ttl: Duration) -> Self {
        now.checked_add(ttl).map_or(Expiry::Never, Expiry::At)
    }

    // == Is Expired ==
    /// An entry is expired once `now` reaches its deadline.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self {
            Expiry::At(deadline) => now >= *deadline,
            Expiry::Never => false,
        }
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Expiry::At(deadline) => Some(*deadline),
            Expiry::Never => None,
        }
    }

    // == Time To Live ==
    /// Time left before expiry, saturating at zero. `None` means no TTL.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

// == Cache Entry ==
/// A stored key/value pair with its expiry.
///
/// The fingerprint is kept so removal never needs to re-hash the key.
#[derive(Debug)]
pub struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) expires_at: Expiry,
    pub(crate) fingerprint: u64,
}

impl<K, V> Entry<K, V> {
    pub fn new(fingerprint: u64, key: K, value: V, expires_at: Expiry) -> Self {
        Self {
            key,
            value,
            expires_at,
            fingerprint,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn expires_at(&self) -> Expiry {
        self.expires_at
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_expired(now)
    }

    /// Consumes the entry, returning its key and value.
    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_does_not_expire() {
        let now = Instant::now();
        let expiry = Expiry::Never;

        assert!(!expiry.is_expired(now));
        assert!(!expiry.is_expired(now + Duration::from_secs(3600 * 24 * 365)));
        assert!(expiry.remaining(now).is_none());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let expiry = Expiry::after(now, Duration::from_millis(5));

        assert!(!expiry.is_expired(now));
        assert!(!expiry.is_expired(now + Duration::from_millis(4)));
        // Expired exactly at the deadline
        assert!(expiry.is_expired(now + Duration::from_millis(5)));
    }

    #[test]
    fn test_remaining_saturates() {
        let now = Instant::now();
        let expiry = Expiry::after(now, Duration::from_millis(10));

        assert_eq!(expiry.remaining(now), Some(Duration::from_millis(10)));
        assert_eq!(
            expiry.remaining(now + Duration::from_millis(50)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_overflowing_ttl_never_expires() {
        let expiry = Expiry::after(Instant::now(), Duration::MAX);
        assert_eq!(expiry, Expiry::Never);
    }

    #[test]
    fn test_entry_into_parts() {
        let entry = Entry::new(7, "key", 42, Expiry::Never);

        assert_eq!(entry.fingerprint(), 7);
        assert_eq!(*entry.value(), 42);
        assert_eq!(entry.into_parts(), ("key", 42));
    }
}
