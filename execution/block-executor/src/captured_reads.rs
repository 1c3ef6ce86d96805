// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use occ_mvhashmap::{
    types::{MVDataError, ObservedVersion, TxnIndex},
    versioned_data::VersionedData,
};
use occ_types::{
    state_store::{prefix_range, StateKey, StateValue},
    write_set::{TransactionWrite, WriteOp},
};
use std::collections::{BTreeMap, BTreeSet};

/// Resolution of a single key within a key range.
pub(crate) struct ResolvedKey {
    pub(crate) key: StateKey,
    pub(crate) version: ObservedVersion,
    /// None if the key is deleted or absent at the resolved version.
    pub(crate) value: Option<StateValue>,
    pub(crate) failed_estimate: bool,
}

/// Resolves all keys under `prefix` at `txn_idx`: the keys storage returned for the
/// prefix plus every key written by some transaction of the block. A key without any
/// entry resolves to storage (where it is absent, as storage did not return it).
pub(crate) fn resolve_prefix(
    data: &VersionedData<StateKey, WriteOp>,
    prefix: &[u8],
    base_keys: &[StateKey],
    txn_idx: TxnIndex,
) -> Vec<ResolvedKey> {
    let mut keys: BTreeSet<StateKey> = base_keys.iter().cloned().collect();
    keys.extend(data.keys_in_range(prefix_range(prefix)));

    keys.into_iter()
        .map(|key| match data.fetch_data(&key, txn_idx) {
            Ok(output) => ResolvedKey {
                version: output.observed_version(),
                value: output.value().as_state_value(),
                failed_estimate: output.is_failed_estimate(),
                key,
            },
            Err(MVDataError::NotFound) => ResolvedKey {
                key,
                version: ObservedVersion::Storage,
                value: None,
                failed_estimate: false,
            },
        })
        .collect()
}

/// A key-range read, recorded as the version every key of the range resolved to
/// (including deleted and absent keys). Comparing versions is enough: the same
/// version always carries the same value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PrefixRead {
    prefix: Vec<u8>,
    // Keys returned by the pre-block storage for the prefix.
    base_keys: Vec<StateKey>,
    observed: BTreeMap<StateKey, ObservedVersion>,
}

impl PrefixRead {
    pub(crate) fn new(prefix: &[u8], base_keys: Vec<StateKey>, resolved: &[ResolvedKey]) -> Self {
        Self {
            prefix: prefix.to_vec(),
            base_keys,
            observed: resolved
                .iter()
                .map(|r| (r.key.clone(), r.version))
                .collect(),
        }
    }

    fn validate(
        &self,
        data: &VersionedData<StateKey, WriteOp>,
        idx_to_validate: TxnIndex,
        conflicts: &mut BTreeSet<TxnIndex>,
    ) {
        for current in resolve_prefix(data, &self.prefix, &self.base_keys, idx_to_validate) {
            // Keys written after the range was read were absent from it.
            let observed = self
                .observed
                .get(&current.key)
                .copied()
                .unwrap_or(ObservedVersion::Storage);

            if current.failed_estimate {
                conflicts.extend(current.version.author());
            } else if current.version != observed {
                conflicts.extend(current.version.author());
                conflicts.extend(observed.author());
            }
        }
    }
}

/// A point read: the version it resolved to and the value it returned.
#[derive(Clone, Debug, PartialEq, Eq)]
struct DataRead {
    version: ObservedVersion,
    value: Option<StateValue>,
}

/// The read-set and iterate-set captured during one execution of a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CapturedReads {
    data_reads: BTreeMap<StateKey, DataRead>,
    prefix_reads: Vec<PrefixRead>,
}

impl CapturedReads {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records the version and value a point read resolved to. Only the first read of a
    /// key is captured, later reads of the same key must be served by [`Self::get_by_key`].
    pub(crate) fn capture_read(
        &mut self,
        key: StateKey,
        version: ObservedVersion,
        value: Option<StateValue>,
    ) {
        self.data_reads
            .entry(key)
            .or_insert(DataRead { version, value });
    }

    /// The value returned by an earlier point read of the key, if any.
    pub(crate) fn get_by_key(&self, key: &StateKey) -> Option<Option<StateValue>> {
        self.data_reads.get(key).map(|read| read.value.clone())
    }

    pub(crate) fn capture_prefix_read(&mut self, read: PrefixRead) {
        self.prefix_reads.push(read);
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.data_reads.is_empty() && self.prefix_reads.is_empty()
    }

    /// Checks that every captured read would resolve to the same version if the
    /// transaction ran now. On divergence, returns the indices of the transactions
    /// whose current or previously observed writes caused it. A read that resolves to
    /// the estimate of a failed execution never validates.
    pub(crate) fn validate(
        &self,
        data: &VersionedData<StateKey, WriteOp>,
        idx_to_validate: TxnIndex,
    ) -> Result<(), BTreeSet<TxnIndex>> {
        let mut conflicts = BTreeSet::new();

        for (key, read) in self.data_reads.iter() {
            let observed = &read.version;
            match data.fetch_data(key, idx_to_validate) {
                Ok(output) => {
                    let current = output.observed_version();
                    if output.is_failed_estimate() {
                        conflicts.extend(current.author());
                    } else if current != *observed {
                        conflicts.extend(current.author());
                        conflicts.extend(observed.author());
                    }
                },
                // The storage value is cached before a read resolves to it, so the
                // observed entry must have been authored and since removed.
                Err(MVDataError::NotFound) => conflicts.extend(observed.author()),
            }
        }

        for read in self.prefix_reads.iter() {
            read.validate(data, idx_to_validate, &mut conflicts);
        }

        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(conflicts)
        }
    }
}
