// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::task::{ExecutionStatus, ExecutorTask, TransactionView};
use occ_mvhashmap::types::TxnIndex;
use occ_types::state_store::{InMemoryStateStore, StateKey, StateValue};
use proptest::{collection::vec, option, prelude::*, sample::Index};
use proptest_derive::Arbitrary;
use rand::Rng;
use std::{thread, time::Duration};

///////////////////////////////////////////////////////////////////////////
// Generation of transactions
///////////////////////////////////////////////////////////////////////////

/// Keys are grouped under this many one-letter prefixes ("a/", "b/", ...), so that
/// prefix iterations overlap with point reads and writes.
pub(crate) const NUM_PREFIXES: usize = 4;

pub(crate) fn decode_u64(value: &StateValue) -> u64 {
    value
        .bytes()
        .as_ref()
        .try_into()
        .map(u64::from_be_bytes)
        .unwrap_or(0)
}

/// Keys "a/000", "b/001", "c/002", ...
pub fn key_universe(size: usize) -> Vec<StateKey> {
    (0..size)
        .map(|i| StateKey::from(format!("{}/{:03}", (b'a' + (i % NUM_PREFIXES) as u8) as char, i).as_str()))
        .collect()
}

pub fn prefix_universe() -> Vec<Vec<u8>> {
    (0..NUM_PREFIXES)
        .map(|i| vec![b'a' + i as u8, b'/'])
        .collect()
}

/// Pre-block storage containing every other key of the universe.
pub fn initial_storage(universe: &[StateKey]) -> InMemoryStateStore {
    universe
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 2 == 0)
        .map(|(i, key)| (key.clone(), StateValue::from(i as u64)))
        .collect()
}

#[derive(Clone, Copy)]
pub struct TransactionGenParams {
    /// Each transaction reads between 0 and read_size - 1 keys.
    pub read_size: usize,
    /// Each transaction iterates between 0 and prefix_read_size - 1 prefixes.
    pub prefix_read_size: usize,
    /// Each transaction writes or deletes between 1 and write_size - 1 keys.
    pub write_size: usize,
}

impl TransactionGenParams {
    pub fn new_prefix_heavy() -> Self {
        TransactionGenParams {
            read_size: 3,
            prefix_read_size: 3,
            write_size: 4,
        }
    }
}

impl Default for TransactionGenParams {
    fn default() -> Self {
        TransactionGenParams {
            read_size: 8,
            prefix_read_size: 2,
            write_size: 5,
        }
    }
}

/// When a mock transaction reports failure.
#[derive(Arbitrary, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockFailure {
    #[proptest(weight = 6)]
    Never,
    Always,
    /// Fails depending on the values it read.
    OnOddDigest,
}

#[derive(Arbitrary, Debug, Clone)]
#[proptest(params = "TransactionGenParams")]
pub struct TransactionGen {
    #[proptest(strategy = "vec(any::<Index>(), 0..params.read_size)")]
    keys_read: Vec<Index>,
    #[proptest(strategy = "vec(any::<Index>(), 0..params.prefix_read_size)")]
    prefixes_read: Vec<Index>,
    /// None deletes the key.
    #[proptest(
        strategy = "vec((any::<Index>(), option::weighted(0.8, 0..1000u64)), 1..params.write_size)"
    )]
    keys_modified: Vec<(Index, Option<u64>)>,
    failure: MockFailure,
}

impl TransactionGen {
    pub fn materialize(self, universe: &[StateKey]) -> MockTransaction {
        let prefixes = prefix_universe();
        MockTransaction {
            reads: self
                .keys_read
                .into_iter()
                .map(|idx| universe[idx.index(universe.len())].clone())
                .collect(),
            prefix_reads: self
                .prefixes_read
                .into_iter()
                .map(|idx| prefixes[idx.index(prefixes.len())].clone())
                .collect(),
            writes: self
                .keys_modified
                .into_iter()
                .map(|(idx, delta)| (universe[idx.index(universe.len())].clone(), delta))
                .collect(),
            failure: self.failure,
        }
    }
}

/// A transaction whose written values depend on everything it read: each written
/// value is the digest of the read values plus a per-write delta. Any stale read
/// therefore shows up in the final state.
#[derive(Clone, Debug)]
pub struct MockTransaction {
    pub reads: Vec<StateKey>,
    pub prefix_reads: Vec<Vec<u8>>,
    /// Later writes to the same key overwrite earlier ones.
    pub writes: Vec<(StateKey, Option<u64>)>,
    pub failure: MockFailure,
}

impl MockTransaction {
    pub fn from_writes(writes: Vec<(StateKey, Option<u64>)>) -> Self {
        Self {
            reads: vec![],
            prefix_reads: vec![],
            writes,
            failure: MockFailure::Never,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockOutput {
    pub reads: Vec<Option<u64>>,
    pub prefix_reads: Vec<Vec<(StateKey, u64)>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockError {
    Failed { digest: u64 },
    Storage,
}

///////////////////////////////////////////////////////////////////////////
// Naive transaction executor implementation.
///////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, Default)]
pub struct MockTaskArgs {
    /// Upper bound of a random delay injected into each execution.
    pub max_delay_micros: u64,
}

pub struct MockTask {
    args: MockTaskArgs,
}

impl ExecutorTask for MockTask {
    type Argument = MockTaskArgs;
    type Error = MockError;
    type Output = MockOutput;
    type Txn = MockTransaction;

    fn init(args: Self::Argument) -> Self {
        Self { args }
    }

    fn execute_transaction(
        &self,
        view: &mut impl TransactionView,
        txn: &Self::Txn,
        _txn_idx: TxnIndex,
    ) -> ExecutionStatus<Self::Output, Self::Error> {
        if self.args.max_delay_micros > 0 {
            let delay = rand::thread_rng().gen_range(0, self.args.max_delay_micros);
            thread::sleep(Duration::from_micros(delay));
        }

        let mut digest = 0u64;
        let mut output = MockOutput {
            reads: Vec::with_capacity(txn.reads.len()),
            prefix_reads: Vec::with_capacity(txn.prefix_reads.len()),
        };

        for key in &txn.reads {
            let value = match view.get(key) {
                Ok(value) => value.as_ref().map(decode_u64),
                Err(_) => return ExecutionStatus::Failure(MockError::Storage),
            };
            digest = digest.wrapping_add(value.unwrap_or(0));
            output.reads.push(value);
        }

        for prefix in &txn.prefix_reads {
            let entries = match view.iter_prefix(prefix) {
                Ok(entries) => entries,
                Err(_) => return ExecutionStatus::Failure(MockError::Storage),
            };
            let entries: Vec<(StateKey, u64)> = entries
                .into_iter()
                .map(|(key, value)| (key, decode_u64(&value)))
                .collect();
            digest = entries.iter().fold(digest.wrapping_add(entries.len() as u64), |d, (_, v)| {
                d.wrapping_add(*v)
            });
            output.prefix_reads.push(entries);
        }

        for (key, delta) in &txn.writes {
            match delta {
                Some(delta) => view.set(key.clone(), StateValue::from(digest.wrapping_add(*delta))),
                None => view.delete(key.clone()),
            }
        }

        let failed = match txn.failure {
            MockFailure::Never => false,
            MockFailure::Always => true,
            MockFailure::OnOddDigest => digest % 2 == 1,
        };
        if failed {
            ExecutionStatus::Failure(MockError::Failed { digest })
        } else {
            ExecutionStatus::Success(output)
        }
    }
}
