// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::Lazy;
use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter};

/// Count of transaction executions, including re-executions and sequential ones.
pub static TXN_EXECUTIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "occ_executor_txn_executions",
        "Number of transaction executions (all incarnations)"
    )
    .unwrap()
});

/// Count of times the BlockSTM is aborted by validation failures.
pub static SPECULATIVE_ABORT_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "occ_executor_speculative_aborts",
        "Number of speculative aborts in parallel execution"
    )
    .unwrap()
});

pub static TXN_REEXECUTIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "occ_executor_reexecutions",
        "Number of executions of an incarnation other than the first"
    )
    .unwrap()
});

/// Count of blocks that fell back to sequential execution after hitting the
/// incarnation limit.
pub static SEQUENTIAL_FALLBACK_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "occ_executor_sequential_fallbacks",
        "Number of blocks that fell back to sequential execution due to livelock"
    )
    .unwrap()
});

/// Final incarnation of every committed transaction.
pub static TXN_INCARNATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "occ_executor_incarnation",
        "Incarnation at which transactions were committed",
        vec![0.0, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0]
    )
    .unwrap()
});

pub static PARALLEL_EXECUTION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "occ_executor_parallel_execution_seconds",
        "Time spent in the parallel phase of block execution"
    )
    .unwrap()
});

pub static SEQUENTIAL_EXECUTION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "occ_executor_sequential_execution_seconds",
        "Time spent executing transactions sequentially"
    )
    .unwrap()
});

pub static TASK_EXECUTE_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "occ_executor_task_execute_seconds",
        "Time spent in a single execution task"
    )
    .unwrap()
});

pub static TASK_VALIDATE_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "occ_executor_task_validate_seconds",
        "Time spent in a single validation task"
    )
    .unwrap()
});

pub static COMMIT_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "occ_executor_commit_seconds",
        "Time spent in the ordered commit pass"
    )
    .unwrap()
});
