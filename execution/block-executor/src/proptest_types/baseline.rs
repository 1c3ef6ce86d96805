// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sequential baseline: executes the mock transactions one by one in block order over a
//! plain ordered map, discarding the writes of failed transactions. The output of the
//! block executor must match it exactly.

use crate::{
    errors::BlockExecutionResult,
    executor::{BlockOutput, TransactionOutcome},
    proptest_types::types::{MockError, MockOutput, MockTask, MockTaskArgs, MockTransaction},
    task::{ExecutionStatus, ExecutorTask, TransactionView},
};
use occ_mvhashmap::types::TxnIndex;
use occ_types::state_store::{prefix_range, StateKey, StateValue, StateViewResult};
use std::collections::BTreeMap;

/// A transaction view over the state of the baseline, buffering writes.
struct BaselineView<'a> {
    state: &'a BTreeMap<StateKey, StateValue>,
    writes: BTreeMap<StateKey, Option<StateValue>>,
    txn_idx: TxnIndex,
}

impl<'a> TransactionView for BaselineView<'a> {
    fn txn_idx(&self) -> TxnIndex {
        self.txn_idx
    }

    fn get(&mut self, key: &StateKey) -> StateViewResult<Option<StateValue>> {
        Ok(match self.writes.get(key) {
            Some(write) => write.clone(),
            None => self.state.get(key).cloned(),
        })
    }

    fn set(&mut self, key: StateKey, value: StateValue) {
        self.writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: StateKey) {
        self.writes.insert(key, None);
    }

    fn iter_prefix(&mut self, prefix: &[u8]) -> StateViewResult<Vec<(StateKey, StateValue)>> {
        let mut entries: BTreeMap<StateKey, StateValue> = self
            .state
            .range(prefix_range(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, write) in self.writes.range(prefix_range(prefix)) {
            match write {
                Some(value) => entries.insert(key.clone(), value.clone()),
                None => entries.remove(key),
            };
        }
        Ok(entries.into_iter().collect())
    }
}

pub(crate) struct BaselineOutput {
    outcomes: Vec<ExecutionStatus<MockOutput, MockError>>,
    final_state: BTreeMap<StateKey, StateValue>,
}

impl BaselineOutput {
    pub(crate) fn generate(
        txns: &[MockTransaction],
        initial_state: BTreeMap<StateKey, StateValue>,
    ) -> Self {
        let task = MockTask::init(MockTaskArgs::default());
        let mut state = initial_state;
        let mut outcomes = Vec::with_capacity(txns.len());

        for (idx, txn) in txns.iter().enumerate() {
            let mut view = BaselineView {
                state: &state,
                writes: BTreeMap::new(),
                txn_idx: idx as TxnIndex,
            };
            let outcome = task.execute_transaction(&mut view, txn, idx as TxnIndex);
            let writes = view.writes;
            if outcome.is_success() {
                for (key, write) in writes {
                    match write {
                        Some(value) => state.insert(key, value),
                        None => state.remove(&key),
                    };
                }
            }
            outcomes.push(outcome);
        }

        Self {
            outcomes,
            final_state: state,
        }
    }

    pub(crate) fn assert_output(
        &self,
        output: &BlockExecutionResult<BlockOutput<MockOutput, MockError>>,
        final_state: &BTreeMap<StateKey, StateValue>,
    ) {
        let output = match output {
            Ok(output) => output,
            Err(err) => panic!("Block execution failed: {:?}", err),
        };
        assert_eq!(output.results.len(), self.outcomes.len());

        for (idx, (result, expected)) in output.results.iter().zip(&self.outcomes).enumerate() {
            match (&result.outcome, expected) {
                (TransactionOutcome::Success(o), ExecutionStatus::Success(expected_o)) => {
                    assert_eq!(o, expected_o, "output of txn {}", idx);
                    assert!(result.writes_applied);
                },
                (TransactionOutcome::Failure(e), ExecutionStatus::Failure(expected_e)) => {
                    assert_eq!(e, expected_e, "error of txn {}", idx);
                    assert!(!result.writes_applied);
                },
                (outcome, expected) => {
                    panic!(
                        "txn {}: outcome {:?} does not match baseline {:?}",
                        idx, outcome, expected
                    )
                },
            }
        }

        assert_eq!(final_state, &self.final_state);
    }
}
