use std::collections::HashMap;
use std::fmt;

use slotmap::SlotMap;

use crate::TileKey;

slotmap::new_key_type! {
    struct EntryId;
}

#[derive(Debug)]
struct CacheNode<V> {
    key: TileKey,
    value: V,
    last_used: u64,
    newer: Option<EntryId>,
    older: Option<EntryId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileCacheCreateError {
    ZeroCapacity,
}

impl fmt::Display for TileCacheCreateError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileCacheCreateError::ZeroCapacity => {
                write!(formatter, "tile cache capacity must be at least 1")
            }
        }
    }
}

impl std::error::Error for TileCacheCreateError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileCacheInvariantError {
    IndexStorageSizeMismatch { indexed: usize, stored: usize },
    RecencyListLengthMismatch { listed: usize, stored: usize },
    DanglingIndexEntry { key: TileKey },
    BrokenBackLink { key: TileKey },
    RecencyNotMonotonic { key: TileKey },
    OverCapacity { len: usize, capacity: usize },
}

impl fmt::Display for TileCacheInvariantError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileCacheInvariantError::IndexStorageSizeMismatch { indexed, stored } => write!(
                formatter,
                "tile cache index holds {indexed} keys but storage holds {stored} entries"
            ),
            TileCacheInvariantError::RecencyListLengthMismatch { listed, stored } => write!(
                formatter,
                "tile cache recency list links {listed} entries but storage holds {stored}"
            ),
            TileCacheInvariantError::DanglingIndexEntry { key } => {
                write!(formatter, "tile cache index entry {key} has no stored bitmap")
            }
            TileCacheInvariantError::BrokenBackLink { key } => {
                write!(formatter, "tile cache recency list back link broken at {key}")
            }
            TileCacheInvariantError::RecencyNotMonotonic { key } => {
                write!(formatter, "tile cache recency order out of sequence at {key}")
            }
            TileCacheInvariantError::OverCapacity { len, capacity } => {
                write!(formatter, "tile cache holds {len} entries over capacity {capacity}")
            }
        }
    }
}

impl std::error::Error for TileCacheInvariantError {}

/// Bounded key -> tile store with least-recently-used eviction.
///
/// Storage lives in a slot map; recency is an intrusive doubly linked list
/// threaded through the nodes, most recent at the head. `index` maps each key
/// to its node. Every key in `index` has exactly one node in the list and
/// vice versa.
#[derive(Debug)]
pub struct TileCache<V> {
    capacity: usize,
    nodes: SlotMap<EntryId, CacheNode<V>>,
    index: HashMap<TileKey, EntryId>,
    most_recent: Option<EntryId>,
    least_recent: Option<EntryId>,
    clock: u64,
}

impl<V> TileCache<V> {
    pub fn new(capacity: usize) -> Result<Self, TileCacheCreateError> {
        if capacity == 0 {
            return Err(TileCacheCreateError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            nodes: SlotMap::with_capacity_and_key(capacity + 1),
            index: HashMap::with_capacity(capacity + 1),
            most_recent: None,
            least_recent: None,
            clock: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.index.contains_key(key)
    }

    /// Looks up `key` and promotes it to most recently used.
    pub fn get(&mut self, key: &TileKey) -> Option<&V> {
        let id = *self.index.get(key)?;
        self.touch(id);
        self.nodes.get(id).map(|node| &node.value)
    }

    /// Looks up `key` without changing recency.
    pub fn peek(&self, key: &TileKey) -> Option<&V> {
        let id = self.index.get(key)?;
        self.nodes.get(*id).map(|node| &node.value)
    }

    pub fn last_used(&self, key: &TileKey) -> Option<u64> {
        let id = self.index.get(key)?;
        self.nodes.get(*id).map(|node| node.last_used)
    }

    /// Inserts or replaces `key` as most recently used, then evicts from the
    /// least recent end until the cache is within capacity. Returns the
    /// replaced value, if any.
    pub fn insert(&mut self, key: TileKey, value: V) -> Option<V> {
        if let Some(&id) = self.index.get(&key) {
            self.touch(id);
            let node = self
                .nodes
                .get_mut(id)
                .expect("tile cache index points at missing node");
            let previous = std::mem::replace(&mut node.value, value);
            self.debug_check();
            return Some(previous);
        }

        let last_used = self.tick();
        let id = self.nodes.insert(CacheNode {
            key,
            value,
            last_used,
            newer: None,
            older: None,
        });
        self.index.insert(key, id);
        self.link_front(id);

        while self.index.len() > self.capacity {
            let Some(evicted) = self.pop_least_recent() else {
                break;
            };
            tracing::trace!(key = %evicted, "evicted least recently used tile");
        }
        self.debug_check();
        None
    }

    pub fn remove(&mut self, key: &TileKey) -> Option<V> {
        let id = self.index.remove(key)?;
        self.unlink(id);
        let node = self
            .nodes
            .remove(id)
            .expect("tile cache index points at missing node");
        self.debug_check();
        Some(node.value)
    }

    /// Keeps only the entries for which `keep` returns true. Recency order of
    /// the survivors is unchanged. Returns how many entries were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&TileKey, &V) -> bool) -> usize {
        let doomed: Vec<TileKey> = self
            .nodes
            .values()
            .filter(|node| !keep(&node.key, &node.value))
            .map(|node| node.key)
            .collect();
        for key in &doomed {
            if let Some(id) = self.index.remove(key) {
                self.unlink(id);
                self.nodes.remove(id);
            }
        }
        self.debug_check();
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.most_recent = None;
        self.least_recent = None;
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<TileKey> {
        let mut keys = Vec::with_capacity(self.index.len());
        let mut cursor = self.most_recent;
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get(id) else {
                break;
            };
            keys.push(node.key);
            cursor = node.older;
        }
        keys
    }

    /// Walks the recency list and cross-checks it against storage and index.
    pub fn check_invariants(&self) -> Result<(), TileCacheInvariantError> {
        let stored = self.nodes.len();
        if self.index.len() != stored {
            return Err(TileCacheInvariantError::IndexStorageSizeMismatch {
                indexed: self.index.len(),
                stored,
            });
        }
        if stored > self.capacity {
            return Err(TileCacheInvariantError::OverCapacity {
                len: stored,
                capacity: self.capacity,
            });
        }
        for (key, id) in &self.index {
            match self.nodes.get(*id) {
                Some(node) if node.key == *key => {}
                _ => return Err(TileCacheInvariantError::DanglingIndexEntry { key: *key }),
            }
        }

        let mut listed = 0usize;
        let mut newer: Option<EntryId> = None;
        let mut newer_used = u64::MAX;
        let mut cursor = self.most_recent;
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get(id) else {
                return Err(TileCacheInvariantError::RecencyListLengthMismatch {
                    listed,
                    stored,
                });
            };
            if node.newer != newer {
                return Err(TileCacheInvariantError::BrokenBackLink { key: node.key });
            }
            if node.last_used > newer_used {
                return Err(TileCacheInvariantError::RecencyNotMonotonic { key: node.key });
            }
            listed += 1;
            if listed > stored {
                return Err(TileCacheInvariantError::RecencyListLengthMismatch {
                    listed,
                    stored,
                });
            }
            newer = Some(id);
            newer_used = node.last_used;
            cursor = node.older;
        }
        if listed != stored || newer != self.least_recent {
            return Err(TileCacheInvariantError::RecencyListLengthMismatch { listed, stored });
        }
        Ok(())
    }

    fn tick(&mut self) -> u64 {
        self.clock = self
            .clock
            .checked_add(1)
            .expect("tile cache recency clock overflow");
        self.clock
    }

    fn touch(&mut self, id: EntryId) {
        let last_used = self.tick();
        if let Some(node) = self.nodes.get_mut(id) {
            node.last_used = last_used;
        }
        if self.most_recent != Some(id) {
            self.unlink(id);
            self.link_front(id);
        }
    }

    fn link_front(&mut self, id: EntryId) {
        let previous_head = self.most_recent;
        if let Some(node) = self.nodes.get_mut(id) {
            node.newer = None;
            node.older = previous_head;
        }
        match previous_head {
            Some(head) => {
                if let Some(head_node) = self.nodes.get_mut(head) {
                    head_node.newer = Some(id);
                }
            }
            None => self.least_recent = Some(id),
        }
        self.most_recent = Some(id);
    }

    fn unlink(&mut self, id: EntryId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let newer = node.newer.take();
        let older = node.older.take();
        match newer {
            Some(newer_id) => {
                if let Some(newer_node) = self.nodes.get_mut(newer_id) {
                    newer_node.older = older;
                }
            }
            None => self.most_recent = older,
        }
        match older {
            Some(older_id) => {
                if let Some(older_node) = self.nodes.get_mut(older_id) {
                    older_node.newer = newer;
                }
            }
            None => self.least_recent = newer,
        }
    }

    fn pop_least_recent(&mut self) -> Option<TileKey> {
        let id = self.least_recent?;
        self.unlink(id);
        let node = self.nodes.remove(id)?;
        self.index.remove(&node.key);
        Some(node.key)
    }

    fn debug_check(&self) {
        #[cfg(debug_assertions)]
        if let Err(error) = self.check_invariants() {
            panic!("tile cache invariant violated: {error}");
        }
    }
}
