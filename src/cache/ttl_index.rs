//! TTL Index Module
//!
//! Entries with a deadline, sorted by descending expiry: index 0 expires last,
//! the back of the vector expires first. Expired entries are always a suffix.

use tokio::time::Instant;

use crate::cache::list::EntryRef;

#[derive(Debug, Clone, Copy)]
struct TtlSlot {
    expires_at: Instant,
    entry: EntryRef,
}

// == TTL Index ==
#[derive(Debug, Default)]
pub struct TtlIndex {
    slots: Vec<TtlSlot>,
}

impl TtlIndex {
    // == Constructor ==
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert Sorted ==
    /// Inserts before the first slot that does not expire strictly later.
    pub fn insert_sorted(&mut self, entry: EntryRef, expires_at: Instant) {
        let pos = self
            .slots
            .partition_point(|slot| slot.expires_at > expires_at);
        self.slots.insert(pos, TtlSlot { expires_at, entry });
    }

    // == Pop Expired ==
    /// Removes and returns the soonest-expiring entry if it is expired at `now`.
    pub fn pop_expired(&mut self, now: Instant) -> Option<EntryRef> {
        match self.slots.last() {
            Some(slot) if slot.expires_at <= now => self.slots.pop().map(|slot| slot.entry),
            _ => None,
        }
    }

    // == Remove ==
    /// Removes `entry` if present. Scans from the back.
    pub fn remove(&mut self, entry: EntryRef) -> bool {
        match self.slots.iter().rposition(|slot| slot.entry == entry) {
            Some(pos) => {
                self.slots.remove(pos);
                true
            }
            None => false,
        }
    }

    // == Soonest ==
    /// Deadline of the soonest-expiring entry.
    pub fn soonest(&self) -> Option<Instant> {
        self.slots.last().map(|slot| slot.expires_at)
    }

    // == Contains ==
    /// Returns true if `entry` has a slot.
    pub fn contains(&self, entry: EntryRef) -> bool {
        self.slots.iter().any(|slot| slot.entry == entry)
    }

    // == Size ==
    /// Number of entries carrying a deadline.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no entry carries a deadline.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // == Clear ==
    /// Drops every slot.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    // == Iteration ==
    /// Iterates from latest to soonest expiry.
    pub fn iter(&self) -> impl Iterator<Item = (EntryRef, Instant)> + '_ {
        self.slots.iter().map(|slot| (slot.entry, slot.expires_at))
    }

    /// Returns true if slots are ordered latest first.
    pub fn is_sorted(&self) -> bool {
        self.slots
            .windows(2)
            .all(|pair| pair[0].expires_at >= pair[1].expires_at)
    }
}
