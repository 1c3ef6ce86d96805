// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    config::BlockExecutorConfig,
    executor::BlockExecutor,
    proptest_types::types::{
        initial_storage, key_universe, MockTask, MockTaskArgs, MockTransaction, TransactionGen,
        TransactionGenParams,
    },
};
use criterion::{BatchSize, Bencher as CBencher};
use occ_types::state_store::InMemoryStateStore;
use proptest::{
    arbitrary::any_with,
    collection::vec,
    strategy::{Strategy, ValueTree},
    test_runner::TestRunner,
};
use std::sync::Arc;

pub struct Bencher {
    transaction_size: usize,
    universe_size: usize,
    concurrency_level: usize,
}

pub(crate) struct BencherState {
    transactions: Vec<MockTransaction>,
    storage: InMemoryStateStore,
    executor: BlockExecutor<MockTask>,
}

impl Bencher {
    pub fn new(transaction_size: usize, universe_size: usize, concurrency_level: usize) -> Self {
        Self {
            transaction_size,
            universe_size,
            concurrency_level,
        }
    }

    pub fn bench(&self, bencher: &mut CBencher) {
        bencher.iter_batched(
            || {
                BencherState::with_universe(
                    self.universe_size,
                    self.transaction_size,
                    self.concurrency_level,
                )
            },
            |state| state.run(),
            // The input here is the entire list of signed transactions, so it's pretty large.
            BatchSize::LargeInput,
        )
    }
}

impl BencherState {
    /// Creates a new benchmark state with the given number of keys and transactions.
    pub(crate) fn with_universe(
        universe_size: usize,
        num_transactions: usize,
        concurrency_level: usize,
    ) -> Self {
        let mut runner = TestRunner::default();
        let universe = key_universe(universe_size);
        let transaction_gens = vec(
            any_with::<TransactionGen>(TransactionGenParams::default()),
            num_transactions,
        )
        .new_tree(&mut runner)
        .expect("creating a new value should succeed")
        .current();

        let transactions = transaction_gens
            .into_iter()
            .map(|txn_gen| txn_gen.materialize(&universe))
            .collect();

        let executor_thread_pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(concurrency_level)
                .build()
                .expect("thread pool should build"),
        );
        let config = BlockExecutorConfig {
            concurrency_level,
            ..Default::default()
        };

        Self {
            transactions,
            storage: initial_storage(&universe),
            executor: BlockExecutor::new(config, executor_thread_pool)
                .expect("bench config should be valid"),
        }
    }

    pub(crate) fn run(mut self) {
        self.executor
            .execute_block(MockTaskArgs::default(), &self.transactions, &mut self.storage)
            .expect("block execution should succeed");
    }
}
