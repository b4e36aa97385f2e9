//! Recency List Module
//!
//! Doubly-linked list of entries ordered by recency, stored in an arena.
//!
//! Nodes link to each other by slot index. Slot 0 is the sentinel: its `next`
//! is the front (most recently used) and its `prev` is the back (least recently
//! used). Freed slots are reused; every reuse bumps the slot generation so that
//! an old [`EntryRef`] can never reach the new occupant. Handles also carry the
//! id of the list that issued them.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::entry::{Entry, Expiry};

const SENTINEL: usize = 0;

static NEXT_LIST_ID: AtomicU64 = AtomicU64::new(1);

// == Entry Handle ==
/// Non-owning handle to an entry held by a [`RecencyList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryRef {
    list: u64,
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Node<K, V> {
    prev: usize,
    next: usize,
    generation: u32,
    entry: Option<Entry<K, V>>,
}

impl<K, V> Node<K, V> {
    fn vacant(generation: u32) -> Self {
        Self {
            prev: SENTINEL,
            next: SENTINEL,
            generation,
            entry: None,
        }
    }
}

// == Recency List ==
/// Owns every entry in the cache.
///
/// - Front = Most recently used
/// - Back = Least recently used
#[derive(Debug)]
pub struct RecencyList<K, V> {
    id: u64,
    nodes: Vec<Node<K, V>>,
    free: Vec<usize>,
    len: usize,
}

impl<K, V> Default for RecencyList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecencyList<K, V> {
    // == Constructor ==
    /// Creates an empty list holding only the sentinel.
    pub fn new() -> Self {
        Self {
            id: NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed),
            nodes: vec![Node::vacant(0)],
            free: Vec::new(),
            len: 0,
        }
    }

    // == Size ==
    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the list holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // == Ownership ==
    /// Returns true if `entry` refers to a live node of this list.
    pub fn owns(&self, entry: EntryRef) -> bool {
        entry.list == self.id
            && entry.index != SENTINEL
            && self
                .nodes
                .get(entry.index)
                .is_some_and(|node| node.generation == entry.generation && node.entry.is_some())
    }

    // == Push Front ==
    /// Inserts a new entry as the most recently used.
    pub fn push_front(&mut self, fingerprint: u64, key: K, value: V, expires_at: Expiry) -> EntryRef {
        let entry = Entry::new(fingerprint, key, value, expires_at);
        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index].entry = Some(entry);
                index
            }
            None => {
                let mut node = Node::vacant(0);
                node.entry = Some(entry);
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        self.link_front(index);
        self.len += 1;

        EntryRef {
            list: self.id,
            index,
            generation: self.nodes[index].generation,
        }
    }

    // == Move To Front ==
    /// Marks an entry as most recently used.
    ///
    /// No-op if the entry is already at the front or not owned by this list.
    pub fn move_to_front(&mut self, entry: EntryRef) {
        if !self.owns(entry) || self.nodes[SENTINEL].next == entry.index {
            return;
        }

        self.unlink(entry.index);
        self.link_front(entry.index);
    }

    // == Last ==
    /// Returns the least recently used entry.
    pub fn last(&self) -> Option<EntryRef> {
        self.handle(self.nodes[SENTINEL].prev)
    }

    // == First ==
    /// Returns the most recently used entry.
    pub fn first(&self) -> Option<EntryRef> {
        self.handle(self.nodes[SENTINEL].next)
    }

    // == Get ==
    /// Resolves a handle, or None if it is stale or foreign.
    pub fn get(&self, entry: EntryRef) -> Option<&Entry<K, V>> {
        if !self.owns(entry) {
            return None;
        }
        self.nodes[entry.index].entry.as_ref()
    }

    /// Mutable counterpart of [`get`](RecencyList::get).
    pub fn get_mut(&mut self, entry: EntryRef) -> Option<&mut Entry<K, V>> {
        if !self.owns(entry) {
            return None;
        }
        self.nodes[entry.index].entry.as_mut()
    }

    // == Remove ==
    /// Unlinks an entry and hands it back to the caller.
    ///
    /// The slot is released and its generation bumped, so `entry` (and any
    /// copy of it) stops resolving.
    pub fn remove(&mut self, entry: EntryRef) -> Option<Entry<K, V>> {
        if !self.owns(entry) {
            return None;
        }

        self.unlink(entry.index);
        let node = &mut self.nodes[entry.index];
        node.generation = node.generation.wrapping_add(1);
        let removed = node.entry.take();

        self.free.push(entry.index);
        self.len -= 1;
        removed
    }

    // == Drain ==
    /// Removes every entry, front to back, and reinitializes the sentinel.
    pub fn drain(&mut self) -> Vec<Entry<K, V>> {
        let mut drained = Vec::with_capacity(self.len);
        let mut cursor = self.nodes[SENTINEL].next;

        while cursor != SENTINEL {
            let node = &mut self.nodes[cursor];
            let next = node.next;
            node.prev = SENTINEL;
            node.next = SENTINEL;
            node.generation = node.generation.wrapping_add(1);
            if let Some(entry) = node.entry.take() {
                drained.push(entry);
            }
            self.free.push(cursor);
            cursor = next;
        }

        self.nodes[SENTINEL].next = SENTINEL;
        self.nodes[SENTINEL].prev = SENTINEL;
        self.len = 0;
        drained
    }

    // == Iteration ==
    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            list: self,
            cursor: self.nodes[SENTINEL].next,
        }
    }

    fn handle(&self, index: usize) -> Option<EntryRef> {
        if index == SENTINEL {
            return None;
        }
        Some(EntryRef {
            list: self.id,
            index,
            generation: self.nodes[index].generation,
        })
    }

    fn link_front(&mut self, index: usize) {
        let first = self.nodes[SENTINEL].next;

        self.nodes[index].prev = SENTINEL;
        self.nodes[index].next = first;
        self.nodes[first].prev = index;
        self.nodes[SENTINEL].next = index;
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = (self.nodes[index].prev, self.nodes[index].next);

        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.nodes[index].prev = SENTINEL;
        self.nodes[index].next = SENTINEL;
    }
}

// == Iterator ==
pub struct Iter<'a, K, V> {
    list: &'a RecencyList<K, V>,
    cursor: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = &'a Entry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor != SENTINEL {
            let node = &self.list.nodes[self.cursor];
            self.cursor = node.next;
            if let Some(entry) = node.entry.as_ref() {
                return Some(entry);
            }
        }
        None
    }
}
