// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::types::{
    Flag, Incarnation, MVDataError, MVDataOutput, ShiftedTxnIndex, TxnIndex,
};
use crossbeam::utils::CachePadded;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::{
    collections::{btree_map::BTreeMap, BTreeSet},
    fmt::Debug,
    hash::Hash,
    ops::RangeBounds,
    sync::Arc,
};

/// Every entry in shared multi-version data-structure has a flag, the incarnation
/// that wrote it, and the value (which may be a deletion).
struct Entry<V> {
    incarnation: Incarnation,
    flag: Flag,
    value: Arc<V>,
}

/// A version cell: a BTreeMap from indices of transactions that update the given key
/// alongside the corresponding entries. ShiftedTxnIndex::zero_idx() holds the pre-block
/// value once it was read from storage.
struct VersionedValue<V> {
    versioned_map: BTreeMap<ShiftedTxnIndex, CachePadded<Entry<V>>>,
}

impl<V> Default for VersionedValue<V> {
    fn default() -> Self {
        Self {
            versioned_map: BTreeMap::new(),
        }
    }
}

impl<V> VersionedValue<V> {
    fn read(&self, txn_idx: TxnIndex) -> Result<MVDataOutput<V>, MVDataError> {
        match self
            .versioned_map
            .range(ShiftedTxnIndex::zero_idx()..ShiftedTxnIndex::new(txn_idx))
            .next_back()
        {
            Some((shifted_idx, entry)) => Ok(match shifted_idx.idx() {
                Some(idx) => MVDataOutput::Versioned(
                    (idx, entry.incarnation),
                    entry.flag,
                    entry.value.clone(),
                ),
                None => MVDataOutput::Storage(entry.value.clone()),
            }),
            None => Err(MVDataError::NotFound),
        }
    }
}

/// Maps each key to its version cell. Concurrency is managed by DashMap, i.e. when a
/// method accesses a cell at a given key, it holds exclusive access and doesn't need to
/// explicitly synchronize with other readers / writers.
pub struct VersionedData<K, V> {
    values: DashMap<K, VersionedValue<V>>,
    // Ordered index of every key written by a transaction in this block, used to
    // enumerate key ranges. Keys are never removed: a key whose entries were all
    // invalidated simply resolves to storage.
    written_keys: RwLock<BTreeSet<K>>,
}

impl<K: Hash + Ord + Clone + Eq + Debug, V> VersionedData<K, V> {
    pub(crate) fn empty() -> Self {
        Self {
            values: DashMap::new(),
            written_keys: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn num_keys(&self) -> usize {
        self.values.len()
    }

    /// Returns the entry with the greatest transaction index below `txn_idx`, of any
    /// kind, or the cached storage value if no transaction below wrote the key.
    pub fn fetch_data(&self, key: &K, txn_idx: TxnIndex) -> Result<MVDataOutput<V>, MVDataError> {
        self.values
            .get(key)
            .map(|v| v.read(txn_idx))
            .unwrap_or(Err(MVDataError::NotFound))
    }

    /// Caches the pre-block value of `key`. All readers obtain storage values from the
    /// same immutable snapshot, so the first provided value is kept.
    pub fn set_base_value(&self, key: K, value: V) {
        let mut v = self.values.entry(key).or_default();
        v.versioned_map
            .entry(ShiftedTxnIndex::zero_idx())
            .or_insert_with(|| {
                CachePadded::new(Entry {
                    incarnation: 0,
                    flag: Flag::Committed,
                    value: Arc::new(value),
                })
            });
    }

    /// Versioned write of a value at a given key, by a given incarnation of a transaction.
    /// Overwrites a previous entry of the same transaction.
    pub fn write(&self, key: K, txn_idx: TxnIndex, incarnation: Incarnation, data: V, flag: Flag) {
        // Index first: a range reader that observes the key before its entry simply
        // resolves it below txn_idx.
        if !self.written_keys.read().contains(&key) {
            self.written_keys.write().insert(key.clone());
        }

        let mut v = self.values.entry(key).or_default();
        v.versioned_map.insert(
            ShiftedTxnIndex::new(txn_idx),
            CachePadded::new(Entry {
                incarnation,
                flag,
                value: Arc::new(data),
            }),
        );
    }

    /// Removes the entry written by transaction `txn_idx` at `key`. Returns false if
    /// there was no such entry.
    pub fn remove(&self, key: &K, txn_idx: TxnIndex) -> bool {
        self.values
            .get_mut(key)
            .map_or(false, |mut v| {
                v.versioned_map
                    .remove(&ShiftedTxnIndex::new(txn_idx))
                    .is_some()
            })
    }

    /// Converts an estimate written by `txn_idx` at `key` to a committed entry. Returns
    /// the previous flag, or None if no entry of the transaction exists.
    pub fn mark_committed(&self, key: &K, txn_idx: TxnIndex) -> Option<Flag> {
        let mut v = self.values.get_mut(key)?;
        let entry = v.versioned_map.get_mut(&ShiftedTxnIndex::new(txn_idx))?;
        let prev = entry.flag;
        entry.flag = Flag::Committed;
        Some(prev)
    }

    /// All keys written by some transaction of the block within `range`, in key order.
    pub fn keys_in_range<R: RangeBounds<K>>(&self, range: R) -> Vec<K> {
        self.written_keys.read().range(range).cloned().collect()
    }
}
