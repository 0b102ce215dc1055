//! Least-recently-used cache with an explicit expiry pass.
//!
//! Unlike a capacity-bounded LRU, inserting never evicts. The cache only
//! shrinks back to its high water mark when [`LruCache::expire_cache`] is
//! called, which lets the owner decide when the eviction pass runs
//! (typically once per rendered frame).
//!
//! # Layout
//!
//! Entries live in a slot arena and are threaded into a doubly-linked
//! recency list by index. The key map stores slot indices and is the only
//! way entries are owned; `older`/`newer` links are navigation only.
//!
//! ```text
//!   oldest                                  newest
//!     │                                       │
//!     ▼                                       ▼
//!  ┌──────┐ newer ┌──────┐ newer ┌──────┐
//!  │  a   │──────▶│  b   │──────▶│  c   │
//!  │      │◀──────│      │◀──────│      │
//!  └──────┘ older └──────┘ older └──────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::CacheError;

/// Default high water mark for caches created with [`LruCache::default`].
pub const DEFAULT_HIGH_WATER_MARK: usize = 2048;

/// Sentinel for a missing link.
const NIL: usize = usize::MAX;

struct Entry<T> {
    key: String,
    value: T,
    older: usize,
    newer: usize,
}

/// LRU cache keyed by strings, pruned on demand down to a high water mark.
///
/// # Example
///
/// ```
/// use std::collections::HashSet;
/// use tile_supply::collections::LruCache;
///
/// let mut cache = LruCache::new(2);
/// cache.set("a", 1).unwrap();
/// cache.set("b", 2).unwrap();
/// cache.set("c", 3).unwrap();
/// assert_eq!(cache.len(), 3);
///
/// cache.expire_cache(&HashSet::new());
/// assert_eq!(cache.keys(), vec!["b", "c"]);
/// ```
pub struct LruCache<T> {
    high_water_mark: usize,
    entries: HashMap<String, usize>,
    slots: Vec<Option<Entry<T>>>,
    free_slots: Vec<usize>,
    oldest: usize,
    newest: usize,
}

impl<T> LruCache<T> {
    /// Create an empty cache.
    ///
    /// # Arguments
    /// * `high_water_mark` - Size `expire_cache` prunes down to; `0` disables pruning
    pub fn new(high_water_mark: usize) -> Self {
        Self {
            high_water_mark,
            entries: HashMap::new(),
            slots: Vec::new(),
            free_slots: Vec::new(),
            oldest: NIL,
            newest: NIL,
        }
    }

    /// Whether the cache holds more entries than its high water mark.
    pub fn can_expire_cache(&self) -> bool {
        self.high_water_mark > 0 && self.len() > self.high_water_mark
    }

    /// Evict oldest entries until the cache is back at its high water mark.
    ///
    /// Eviction stops at the first oldest entry whose key is in `keep`, even
    /// if younger entries could still be evicted. Returns the number of
    /// evicted entries.
    pub fn expire_cache(&mut self, keep: &HashSet<String>) -> usize {
        self.expire_cache_with(keep, |_, _| {})
    }

    /// Like [`expire_cache`](Self::expire_cache), handing every evicted
    /// entry to `on_evict`.
    pub fn expire_cache_with<F>(&mut self, keep: &HashSet<String>, mut on_evict: F) -> usize
    where
        F: FnMut(String, T),
    {
        let mut evicted = 0;
        while self.can_expire_cache() {
            let oldest = self.entry(self.oldest);
            if keep.contains(&oldest.key) {
                break;
            }
            let entry = self.detach(self.oldest);
            on_evict(entry.key, entry.value);
            evicted += 1;
        }
        evicted
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.slots.clear();
        self.free_slots.clear();
        self.oldest = NIL;
        self.newest = NIL;
    }

    /// Whether `key` is cached. Does not affect recency.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Call `f` with every value and key, oldest first.
    ///
    /// The cache is borrowed for the whole iteration, so it cannot be
    /// modified from inside the callback.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&T, &str),
    {
        for (key, value) in self.iter() {
            f(value, key);
        }
    }

    /// Return the value for `key` and mark it as the newest entry.
    pub fn get(&mut self, key: &str) -> Result<&T, CacheError> {
        let index = self.index_of(key)?;
        if index != self.newest {
            self.unlink(index);
            self.push_newest(index);
        }
        Ok(&self.entry(index).value)
    }

    /// Mutable counterpart of [`get`](Self::get).
    pub fn get_mut(&mut self, key: &str) -> Result<&mut T, CacheError> {
        let index = self.index_of(key)?;
        if index != self.newest {
            self.unlink(index);
            self.push_newest(index);
        }
        Ok(&mut self.entry_mut(index).value)
    }

    /// Remove `key` and return its value.
    pub fn remove(&mut self, key: &str) -> Result<T, CacheError> {
        let index = self.index_of(key)?;
        Ok(self.detach(index).value)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current high water mark.
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> Vec<&str> {
        self.iter().map(|(key, _)| key).collect()
    }

    /// Values from oldest to newest.
    pub fn values(&self) -> Vec<&T> {
        self.iter().map(|(_, value)| value).collect()
    }

    /// Iterate over `(key, value)` pairs from oldest to newest.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            cache: self,
            next: self.oldest,
        }
    }

    /// Value of the oldest entry.
    pub fn peek_last(&self) -> Option<&T> {
        self.slot(self.oldest).map(|entry| &entry.value)
    }

    /// Key of the oldest entry.
    pub fn peek_last_key(&self) -> Option<&str> {
        self.slot(self.oldest).map(|entry| entry.key.as_str())
    }

    /// Key of the newest entry.
    pub fn peek_first_key(&self) -> Option<&str> {
        self.slot(self.newest).map(|entry| entry.key.as_str())
    }

    /// Return the value for `key` without changing recency.
    pub fn peek(&self, key: &str) -> Option<&T> {
        let index = *self.entries.get(key)?;
        Some(&self.entry(index).value)
    }

    /// Remove and return the oldest value.
    pub fn pop(&mut self) -> Result<T, CacheError> {
        if self.oldest == NIL {
            return Err(CacheError::Empty);
        }
        Ok(self.detach(self.oldest).value)
    }

    /// Remove the oldest entry.
    pub fn delete_oldest(&mut self) -> Result<(), CacheError> {
        self.pop().map(|_| ())
    }

    /// Replace the value of an existing key and mark it as newest.
    pub fn replace(&mut self, key: &str, value: T) -> Result<(), CacheError> {
        let slot = self.get_mut(key)?;
        *slot = value;
        Ok(())
    }

    /// Insert a new key as the newest entry.
    ///
    /// Never evicts; call [`expire_cache`](Self::expire_cache) to prune.
    pub fn set(&mut self, key: impl Into<String>, value: T) -> Result<(), CacheError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(CacheError::DuplicateKey(key));
        }

        let entry = Entry {
            key: key.clone(),
            value,
            older: NIL,
            newer: NIL,
        };
        let index = match self.free_slots.pop() {
            Some(index) => {
                self.slots[index] = Some(entry);
                index
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };

        self.entries.insert(key, index);
        self.push_newest(index);
        Ok(())
    }

    /// Change the high water mark. Takes effect on the next expiry pass.
    pub fn set_size(&mut self, size: usize) {
        self.high_water_mark = size;
    }

    fn index_of(&self, key: &str) -> Result<usize, CacheError> {
        self.entries
            .get(key)
            .copied()
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn slot(&self, index: usize) -> Option<&Entry<T>> {
        if index == NIL {
            return None;
        }
        self.slots[index].as_ref()
    }

    fn entry(&self, index: usize) -> &Entry<T> {
        self.slots[index]
            .as_ref()
            .expect("linked slot must be occupied")
    }

    fn entry_mut(&mut self, index: usize) -> &mut Entry<T> {
        self.slots[index]
            .as_mut()
            .expect("linked slot must be occupied")
    }

    fn unlink(&mut self, index: usize) {
        let (older, newer) = {
            let entry = self.entry(index);
            (entry.older, entry.newer)
        };

        if older == NIL {
            self.oldest = newer;
        } else {
            self.entry_mut(older).newer = newer;
        }
        if newer == NIL {
            self.newest = older;
        } else {
            self.entry_mut(newer).older = older;
        }

        let entry = self.entry_mut(index);
        entry.older = NIL;
        entry.newer = NIL;
    }

    fn push_newest(&mut self, index: usize) {
        let previous = self.newest;
        {
            let entry = self.entry_mut(index);
            entry.older = previous;
            entry.newer = NIL;
        }

        if previous == NIL {
            self.oldest = index;
        } else {
            self.entry_mut(previous).newer = index;
        }
        self.newest = index;
    }

    /// Unlink a slot, drop it from the key map and recycle it.
    fn detach(&mut self, index: usize) -> Entry<T> {
        self.unlink(index);
        let entry = self.slots[index]
            .take()
            .expect("linked slot must be occupied");
        self.entries.remove(&entry.key);
        self.free_slots.push(index);
        entry
    }
}

impl<T> Default for LruCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_WATER_MARK)
    }
}

impl<T: fmt::Debug> fmt::Debug for LruCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("high_water_mark", &self.high_water_mark)
            .field("entries", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

/// Iterator over a cache's entries from oldest to newest.
pub struct Iter<'a, T> {
    cache: &'a LruCache<T>,
    next: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (&'a str, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.cache.slot(self.next)?;
        self.next = entry.newer;
        Some((entry.key.as_str(), &entry.value))
    }
}

// =============================================================================
// Tests
// =============================================================================
