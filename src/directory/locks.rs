//! Per-record mutual exclusion.
//!
//! Mutating operations read, modify, and rewrite several documents with no
//! transactional backing, so they serialize through an explicit lock table: a
//! fixed set of mutex shards, with every operation acquiring the shards for
//! all record ids it touches before reading.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

const SHARD_COUNT: usize = 32;

/// A sharded lock table keyed by record id.
///
/// Shards for a key set are acquired in ascending index order (deduplicated),
/// so two operations locking overlapping key sets cannot deadlock.
pub struct LockTable {
    shards: Vec<Mutex<()>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(())).collect(),
        }
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    /// Lock every shard covering `keys`, returning guards that release on
    /// drop.
    pub fn lock(&self, keys: &[&str]) -> Vec<MutexGuard<'_, ()>> {
        let mut indices: Vec<usize> = keys.iter().map(|key| self.shard_index(key)).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .map(|i| {
                self.shards[i]
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
            })
            .collect()
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}
