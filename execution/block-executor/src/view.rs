// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    captured_reads::{resolve_prefix, CapturedReads, PrefixRead},
    task::TransactionView,
};
use occ_mvhashmap::{
    types::{Incarnation, MVDataError, TxnIndex},
    MVHashMap,
};
use occ_types::{
    state_store::{StateKey, StateValue, StateViewError, StateViewResult, TStateView},
    write_set::{TransactionWrite, WriteOp, WriteSet},
};
use std::collections::BTreeMap;

/// A transaction-scoped view over the multi-version data-structure. Reads resolve to
/// the latest entry written by a lower transaction, or to the pre-block storage value,
/// and are captured for validation. Writes are buffered until the execution finishes.
pub(crate) struct TxnView<'a, S> {
    base_view: &'a S,
    versioned_map: &'a MVHashMap<StateKey, WriteOp>,
    txn_idx: TxnIndex,
    captured_reads: CapturedReads,
    write_set: WriteSet,
    storage_error: Option<StateViewError>,
}

impl<'a, S: TStateView> TxnView<'a, S> {
    pub(crate) fn new(
        base_view: &'a S,
        versioned_map: &'a MVHashMap<StateKey, WriteOp>,
        txn_idx: TxnIndex,
    ) -> Self {
        Self {
            base_view,
            versioned_map,
            txn_idx,
            captured_reads: CapturedReads::new(),
            write_set: WriteSet::default(),
            storage_error: None,
        }
    }

    /// Error of the first failed storage read, if any. The outcome of an execution that
    /// hit a storage error is meaningless.
    pub(crate) fn take_storage_error(&mut self) -> Option<StateViewError> {
        self.storage_error.take()
    }

    /// Publishes the buffered writes into the multi-version data-structure at the
    /// transaction's index. Writes of a failed execution are published flagged as such.
    pub(crate) fn publish(&self, incarnation: Incarnation, succeeded: bool) {
        self.versioned_map.write_estimates(
            self.txn_idx,
            incarnation,
            self.write_set
                .iter()
                .map(|(k, op)| (k.clone(), op.clone())),
            succeeded,
        );
    }

    pub(crate) fn into_parts(self) -> (CapturedReads, WriteSet) {
        (self.captured_reads, self.write_set)
    }

    fn record_error<T>(&mut self, result: StateViewResult<T>) -> StateViewResult<T> {
        if let Err(err) = &result {
            if self.storage_error.is_none() {
                self.storage_error = Some(err.clone());
            }
        }
        result
    }

    fn read_versioned(&mut self, key: &StateKey) -> StateViewResult<Option<StateValue>> {
        loop {
            match self.versioned_map.data().fetch_data(key, self.txn_idx) {
                Ok(output) => {
                    let value = output.value().as_state_value();
                    self.captured_reads.capture_read(
                        key.clone(),
                        output.observed_version(),
                        value.clone(),
                    );
                    return Ok(value);
                },
                Err(MVDataError::NotFound) => {
                    // Cache the storage value (absence is cached as a deletion) and
                    // read again: a lower transaction may have written the key since.
                    let base = self.base_view.get_state_value(key);
                    let base = self.record_error(base)?;
                    self.versioned_map.data().set_base_value(
                        key.clone(),
                        base.map_or(WriteOp::Deletion, WriteOp::Modification),
                    );
                },
            }
        }
    }
}

impl<'a, S: TStateView> TransactionView for TxnView<'a, S> {
    fn txn_idx(&self) -> TxnIndex {
        self.txn_idx
    }

    fn get(&mut self, key: &StateKey) -> StateViewResult<Option<StateValue>> {
        if let Some(op) = self.write_set.get(key) {
            return Ok(op.as_state_value());
        }
        // Repeated reads are served from the captured read, which is what gets validated.
        if let Some(value) = self.captured_reads.get_by_key(key) {
            return Ok(value);
        }
        self.read_versioned(key)
    }

    fn set(&mut self, key: StateKey, value: StateValue) {
        self.write_set.insert(key, WriteOp::Modification(value));
    }

    fn delete(&mut self, key: StateKey) {
        self.write_set.insert(key, WriteOp::Deletion);
    }

    fn iter_prefix(&mut self, prefix: &[u8]) -> StateViewResult<Vec<(StateKey, StateValue)>> {
        let base = self.base_view.iter_prefix(prefix);
        let base = self.record_error(base)?;

        let mut base_keys = Vec::with_capacity(base.len());
        for (key, value) in base {
            self.versioned_map
                .data()
                .set_base_value(key.clone(), WriteOp::Modification(value));
            base_keys.push(key);
        }

        let resolved = resolve_prefix(
            self.versioned_map.data(),
            prefix,
            &base_keys,
            self.txn_idx,
        );
        self.captured_reads
            .capture_prefix_read(PrefixRead::new(prefix, base_keys, &resolved));

        let mut entries: BTreeMap<StateKey, StateValue> = resolved
            .into_iter()
            .filter_map(|r| r.value.map(|value| (r.key, value)))
            .collect();
        // Own buffered writes take precedence.
        for (key, op) in self.write_set.iter().filter(|(k, _)| k.starts_with(prefix)) {
            match op.as_state_value() {
                Some(value) => {
                    entries.insert(key.clone(), value);
                },
                None => {
                    entries.remove(key);
                },
            }
        }
        Ok(entries.into_iter().collect())
    }
}
