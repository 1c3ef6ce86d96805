// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use occ_mvhashmap::types::TxnIndex;
use occ_types::state_store::{StateKey, StateValue, StateViewResult};
use std::fmt::Debug;

/// The execution result of a transaction, as reported by its handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionStatus<O, E> {
    /// Transaction was executed successfully. Its buffered writes are applied if the
    /// transaction commits.
    Success(O),
    /// Transaction reported a failure (e.g. a business rule violation). Its writes are
    /// never applied, regardless of conflicts.
    Failure(E),
}

impl<O, E> ExecutionStatus<O, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success(_))
    }
}

/// Read / write surface of a single transaction execution. Writes are buffered and
/// only become visible to other transactions once the execution is finished.
pub trait TransactionView {
    /// Index of the transaction in the block.
    fn txn_idx(&self) -> TxnIndex;

    /// Returns the value of `key` as seen by this transaction, including its own
    /// earlier writes. A storage failure is returned as an error; the block executor
    /// stops the block in that case.
    fn get(&mut self, key: &StateKey) -> StateViewResult<Option<StateValue>>;

    fn set(&mut self, key: StateKey, value: StateValue);

    fn delete(&mut self, key: StateKey);

    /// Returns all visible entries whose key starts with `prefix`, in key order.
    fn iter_prefix(&mut self, prefix: &[u8]) -> StateViewResult<Vec<(StateKey, StateValue)>>;

    fn exists(&mut self, key: &StateKey) -> StateViewResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Trait for single threaded transaction executor.
pub trait ExecutorTask: Sync {
    /// Type of transaction.
    type Txn: Sync + Send + 'static;

    /// The output of a successful transaction, returned to the caller.
    type Output: Send + Sync + Debug + 'static;

    /// Reason of a failed transaction, returned to the caller.
    type Error: Clone + Send + Sync + Debug + 'static;

    /// Type to initialize the single thread transaction executor. Copy and Sync are
    /// required because we will create an instance of executor on each individual thread.
    type Argument: Sync + Copy;

    /// Create an instance of the transaction executor.
    fn init(args: Self::Argument) -> Self;

    /// Execute a single transaction given the view of the current state. The handler
    /// must read and write exclusively through `view`.
    fn execute_transaction(
        &self,
        view: &mut impl TransactionView,
        txn: &Self::Txn,
        txn_idx: TxnIndex,
    ) -> ExecutionStatus<Self::Output, Self::Error>;
}
