//! Write-once result table shared by the per-stream workers

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt::Display;
use std::hash::Hash;

use crate::error::{Error, Result};

/// Concurrent map where each key is written at most once
#[derive(Debug)]
pub struct ResultTable<K: Eq + Hash, V> {
    results: DashMap<K, V>,
}

impl<K: Eq + Hash + Display, V> Default for ResultTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Display, V> ResultTable<K, V> {
    pub fn new() -> Self {
        Self {
            results: DashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: DashMap::with_capacity(capacity),
        }
    }

    /// Record the result for `key`
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRecorded`] if `key` already has a result; the stored
    /// value is left untouched.
    pub fn record(&self, key: K, value: V) -> Result<()> {
        match self.results.entry(key) {
            Entry::Occupied(entry) => Err(Error::AlreadyRecorded(entry.key().to_string())),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.results.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Drain the results in the given key order; keys without a result
    /// are skipped
    pub fn into_ordered<'k>(self, order: impl IntoIterator<Item = &'k K>) -> Vec<V>
    where
        K: 'k,
    {
        order
            .into_iter()
            .filter_map(|key| self.results.remove(key).map(|(_, value)| value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_write_once() {
        let table: ResultTable<u32, &str> = ResultTable::new();
        table.record(1, "first").unwrap();
        let err = table.record(1, "second").unwrap_err();
        assert!(matches!(err, Error::AlreadyRecorded(ref key) if key == "1"));
        assert_eq!(table.into_ordered(&[1]), vec!["first"]);
    }

    #[test]
    fn test_parallel_writers_and_order() {
        let table = ResultTable::with_capacity(64);
        (0..64u32)
            .into_par_iter()
            .try_for_each(|key| table.record(key, key * 10))
            .unwrap();
        assert_eq!(table.len(), 64);
        let order: Vec<u32> = (0..64).rev().collect();
        let values = table.into_ordered(&order);
        assert_eq!(values.first(), Some(&630));
        assert_eq!(values.last(), Some(&0));
    }
}
