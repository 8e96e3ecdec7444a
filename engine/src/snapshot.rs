//! Snapshot types.
//!
//! A snapshot is the complete, authoritative result set of a query at one
//! point in time. Two snapshots of the same query are never assumed to be
//! related by a delta; each is compared against the replica on its own.

use crate::{error::Result, Key, KeyExtractor};
use std::collections::HashMap;

/// An immutable keyed set of items, in delivery order.
///
/// Keys are unique. Inserting an item under an existing key replaces the
/// value but keeps the original position.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    entries: Vec<(Key, T)>,
    positions: HashMap<Key, usize>,
}

impl<T> Snapshot<T> {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Build a snapshot from items, deriving each key with `key_fn`.
    ///
    /// Fails with the extractor's error on the first item whose key cannot be
    /// derived.
    pub fn from_items<K>(items: impl IntoIterator<Item = T>, key_fn: &K) -> Result<Self>
    where
        K: KeyExtractor<T> + ?Sized,
    {
        let mut snapshot = Self::new();
        for item in items {
            let key = key_fn.key_of(&item)?;
            snapshot.insert(key, item);
        }
        Ok(snapshot)
    }

    /// Add an item under `key`.
    pub fn insert(&mut self, key: Key, item: T) {
        match self.positions.get(&key) {
            Some(&idx) => self.entries[idx].1 = item,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, item));
            }
        }
    }

    /// Get an item by key.
    pub fn get(&self, key: &Key) -> Option<&T> {
        self.positions.get(key).map(|&idx| &self.entries[idx].1)
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.positions.contains_key(key)
    }

    /// Keys in delivery order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Entries in delivery order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &T)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the snapshot, yielding items in delivery order.
    pub fn into_items(self) -> impl Iterator<Item = T> {
        self.entries.into_iter().map(|(_, v)| v)
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(Key, T)> for Snapshot<T> {
    fn from_iter<I: IntoIterator<Item = (Key, T)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (key, item) in iter {
            snapshot.insert(key, item);
        }
        snapshot
    }
}

impl<T> IntoIterator for Snapshot<T> {
    type Item = (Key, T);
    type IntoIter = std::vec::IntoIter<(Key, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
