// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    types::{Flag, Incarnation, TxnIndex},
    versioned_data::VersionedData,
};
use crossbeam::utils::CachePadded;
use occ_types::error::{code_invariant_error, PanicError};
use parking_lot::Mutex;
use std::{fmt::Debug, hash::Hash};

pub mod types;
pub mod versioned_data;

#[cfg(test)]
mod unit_tests;

/// Main multi-version data-structure used by threads to read/write during parallel
/// execution of one block.
///
/// Version cells live in `VersionedData`. Next to it, an arena indexed by transaction
/// index records the keys the last published incarnation of every transaction wrote,
/// so that all entries authored by a transaction can be invalidated or committed
/// given only its index. A transaction's arena slot is only touched by whoever owns
/// the transaction in the current phase (its execution, its abort, or the commit pass).
pub struct MVHashMap<K, V> {
    data: VersionedData<K, V>,
    txn_writes: Vec<CachePadded<Mutex<Vec<K>>>>,
}

impl<K: Hash + Ord + Clone + Eq + Debug, V> MVHashMap<K, V> {
    pub fn new(num_txns: TxnIndex) -> MVHashMap<K, V> {
        MVHashMap {
            data: VersionedData::empty(),
            txn_writes: (0..num_txns)
                .map(|_| CachePadded::new(Mutex::new(Vec::new())))
                .collect(),
        }
    }

    pub fn num_txns(&self) -> usize {
        self.txn_writes.len()
    }

    pub fn data(&self) -> &VersionedData<K, V> {
        &self.data
    }

    /// Publishes the write-set of an incarnation as estimates at `txn_idx`. Entries of a
    /// previously published incarnation that are not overwritten are removed. Writes of
    /// an execution that reported failure are flagged as such.
    pub fn write_estimates(
        &self,
        txn_idx: TxnIndex,
        incarnation: Incarnation,
        writes: impl IntoIterator<Item = (K, V)>,
        succeeded: bool,
    ) {
        let flag = if succeeded {
            Flag::Estimate
        } else {
            Flag::FailedEstimate
        };

        let mut keys = self.txn_writes[txn_idx as usize].lock();
        let stale: Vec<K> = std::mem::take(&mut *keys);
        for (k, v) in writes {
            keys.push(k.clone());
            self.data.write(k, txn_idx, incarnation, v, flag);
        }
        for k in stale {
            if !keys.contains(&k) {
                self.data.remove(&k, txn_idx);
            }
        }
    }

    /// Removes all entries authored by `txn_idx`, so that later readers fall through to
    /// lower transactions or storage. Returns the keys that were removed.
    pub fn invalidate(&self, txn_idx: TxnIndex) -> Vec<K> {
        let keys = std::mem::take(&mut *self.txn_writes[txn_idx as usize].lock());
        for k in keys.iter() {
            self.data.remove(k, txn_idx);
        }
        keys
    }

    /// Converts all estimates authored by `txn_idx` to committed entries. Only valid for
    /// the commit pass of a transaction whose last execution succeeded.
    pub fn mark_committed(&self, txn_idx: TxnIndex) -> Result<(), PanicError> {
        let keys = self.txn_writes[txn_idx as usize].lock();
        for k in keys.iter() {
            match self.data.mark_committed(k, txn_idx) {
                Some(Flag::Estimate) | Some(Flag::Committed) => {},
                Some(Flag::FailedEstimate) => {
                    return Err(code_invariant_error(format!(
                        "Committing failed estimate of txn {} at {:?}",
                        txn_idx, k
                    )));
                },
                None => {
                    return Err(code_invariant_error(format!(
                        "Entry of txn {} at {:?} must exist to be committed",
                        txn_idx, k
                    )));
                },
            }
        }
        Ok(())
    }

    /// Keys written by the last published incarnation of `txn_idx`.
    pub fn written_keys(&self, txn_idx: TxnIndex) -> Vec<K> {
        self.txn_writes[txn_idx as usize].lock().clone()
    }

    pub fn stats(&self) -> BlockStateStats {
        BlockStateStats {
            num_keys: self.data.num_keys(),
            num_entries: self
                .txn_writes
                .iter()
                .map(|keys| keys.lock().len())
                .sum(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockStateStats {
    /// Number of version cells (keys read from storage or written in the block).
    pub num_keys: usize,
    /// Number of transaction-authored entries currently published.
    pub num_entries: usize,
}
