// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Optimistic parallel execution of a block of transactions.
//!
//! The block has a fixed order (the preset serialization order), and the outcome of
//! executing it is the same as executing its transactions one by one in that order:
//! every transaction reads the writes of the closest lower transaction, and the writes
//! of failed transactions are never applied.
//!
//! Transactions are executed speculatively by a pool of workers. During an execution
//! reads go through a [`TransactionView`](task::TransactionView) which resolves them
//! against a multi-version data-structure and records the observed versions, and writes
//! are buffered. Finished executions publish their writes and are validated by checking
//! that every recorded read (point reads and prefix iterations) still resolves to the
//! same version. A failed validation aborts the incarnation: its writes are removed,
//! and the transaction waits for the transactions it conflicted with before executing
//! again. A scheduler hands out execution and validation tasks, lowest index first, and
//! commits transactions in order once they are validated.
//!
//! When a transaction keeps being aborted and would reach more than `max_incarnation`
//! incarnations, parallel execution is halted and the block is finished sequentially,
//! starting at the first transaction that is not committed.
//!
//! The final commit pass runs on a single thread and applies the write sets of the
//! successful transactions to the backing store in block order.

mod captured_reads;
pub mod config;
pub mod counters;
pub mod errors;
pub mod executor;
#[cfg(any(test, feature = "fuzzing"))]
pub mod proptest_types;
pub mod registry;
pub mod scheduler;
pub mod task;
mod txn_last_input_output;
mod view;

pub use config::{BlockExecutorConfig, ConfigError};
pub use errors::{BlockExecutionError, BlockExecutionResult};
pub use executor::{
    BlockExecutor, BlockOutput, ExecutionSummary, TransactionOutcome, TransactionResult,
};
pub use task::{ExecutionStatus, ExecutorTask, TransactionView};
