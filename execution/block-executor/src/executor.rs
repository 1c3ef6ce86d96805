// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    config::{BlockExecutorConfig, ConfigError},
    counters,
    counters::{
        COMMIT_SECONDS, PARALLEL_EXECUTION_SECONDS, SEQUENTIAL_EXECUTION_SECONDS,
        TASK_EXECUTE_SECONDS, TASK_VALIDATE_SECONDS,
    },
    errors::{BlockExecutionError, BlockExecutionResult},
    scheduler::{Scheduler, SchedulerTask, Wave},
    task::{ExecutionStatus, ExecutorTask},
    txn_last_input_output::{TxnLastInputOutput, TxnOutput},
    view::TxnView,
};
use occ_mvhashmap::{
    types::{Incarnation, TxnIndex},
    MVHashMap,
};
use occ_types::{
    error::{code_invariant_error, PanicError},
    state_store::{StateKey, StateStore, TStateView},
    write_set::WriteOp,
};
use parking_lot::Mutex;
use rayon::ThreadPool;
use std::{
    collections::BTreeMap,
    marker::PhantomData,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tracing::{debug, info};

/// Final outcome of a transaction, as seen by the caller of block execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionOutcome<O, E> {
    Success(O),
    Failure(E),
    /// The transaction could not be finalized because an internal invariant did not
    /// hold. Only reported in release builds, debug builds panic instead.
    InvariantViolation(PanicError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionResult<O, E> {
    pub outcome: TransactionOutcome<O, E>,
    /// Whether the writes of the transaction were applied to the backing store.
    pub writes_applied: bool,
}

/// Execution statistics of one block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Number of transaction executions, all incarnations included.
    pub executions: usize,
    /// Number of aborts due to failed validations.
    pub aborts: usize,
    /// Number of executions of an incarnation greater than 0.
    pub reexecutions: usize,
    /// Number of transactions per final incarnation.
    pub incarnation_histogram: BTreeMap<Incarnation, usize>,
    /// First transaction executed sequentially after the incarnation limit was hit.
    pub sequential_fallback_at: Option<TxnIndex>,
}

#[derive(Debug)]
pub struct BlockOutput<O, E> {
    /// One result per transaction, in block order.
    pub results: Vec<TransactionResult<O, E>>,
    pub summary: ExecutionSummary,
}

#[derive(Default)]
struct ExecutionCounters {
    executions: AtomicUsize,
    aborts: AtomicUsize,
    reexecutions: AtomicUsize,
}

impl ExecutionCounters {
    fn record_execution(&self, incarnation: Incarnation) {
        counters::TXN_EXECUTIONS.inc();
        self.executions.fetch_add(1, Ordering::Relaxed);
        if incarnation > 0 {
            counters::TXN_REEXECUTIONS.inc();
            self.reexecutions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_abort(&self) {
        counters::SPECULATIVE_ABORT_COUNT.inc();
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }
}

/// Per-block state shared by all workers.
struct BlockState<'a, E: ExecutorTask> {
    block: &'a [E::Txn],
    versioned_cache: MVHashMap<StateKey, WriteOp>,
    last_input_output: TxnLastInputOutput<E::Output, E::Error>,
    scheduler: Scheduler,
    counters: ExecutionCounters,
}

pub struct BlockExecutor<E> {
    config: BlockExecutorConfig,
    executor_thread_pool: Arc<ThreadPool>,
    phantom: PhantomData<E>,
}

impl<E: ExecutorTask> BlockExecutor<E> {
    /// The config is sanitized first: a concurrency level of 1 executes blocks
    /// sequentially, higher levels use as many workers of the thread pool.
    pub fn new(
        mut config: BlockExecutorConfig,
        executor_thread_pool: Arc<ThreadPool>,
    ) -> Result<Self, ConfigError> {
        config.sanitize()?;
        Ok(Self {
            config,
            executor_thread_pool,
            phantom: PhantomData,
        })
    }

    pub fn config(&self) -> &BlockExecutorConfig {
        &self.config
    }

    fn execute<S: TStateView>(
        txn_idx: TxnIndex,
        incarnation: Incarnation,
        state: &BlockState<E>,
        executor: &E,
        base_view: &S,
    ) -> BlockExecutionResult<SchedulerTask> {
        let _timer = TASK_EXECUTE_SECONDS.start_timer();
        let txn = &state.block[txn_idx as usize];

        let mut view = TxnView::new(base_view, &state.versioned_cache, txn_idx);
        let status = executor.execute_transaction(&mut view, txn, txn_idx);
        state.counters.record_execution(incarnation);
        if let Some(err) = view.take_storage_error() {
            return Err(err.into());
        }

        // Writes are published regardless of the outcome, and tagged with it.
        view.publish(incarnation, status.is_success());
        let (reads, write_set) = view.into_parts();
        // Writes of the previous incarnation were removed when it was aborted, so any
        // write may invalidate reads of higher transactions.
        let revalidate_suffix = !write_set.is_empty();
        state
            .last_input_output
            .record(txn_idx, reads, status, write_set);

        Ok(state
            .scheduler
            .finish_execution(txn_idx, incarnation, revalidate_suffix)?)
    }

    fn validate(
        txn_idx: TxnIndex,
        incarnation: Incarnation,
        validation_wave: Wave,
        state: &BlockState<E>,
    ) -> BlockExecutionResult<SchedulerTask> {
        let _timer = TASK_VALIDATE_SECONDS.start_timer();
        let read_set = state.last_input_output.read_set(txn_idx).ok_or_else(|| {
            code_invariant_error(format!(
                "[BlockSTM]: Prior read-set of txn {} must be recorded",
                txn_idx
            ))
        })?;

        match read_set.validate(state.versioned_cache.data(), txn_idx) {
            Ok(()) => {
                state.scheduler.finish_validation(
                    txn_idx,
                    incarnation,
                    validation_wave,
                    || {
                        // The failure is final for this incarnation: drop its writes so
                        // that no transaction keeps observing them.
                        if state.last_input_output.is_failure(txn_idx) {
                            state.versioned_cache.invalidate(txn_idx);
                        }
                    },
                )?;
                Ok(SchedulerTask::NoTask)
            },
            Err(conflicts) => {
                if !state.scheduler.try_abort(txn_idx, incarnation) {
                    return Ok(SchedulerTask::NoTask);
                }
                state.counters.record_abort();
                debug!(
                    "[BlockSTM]: Txn {} incarnation {} aborted, conflicts with {:?}",
                    txn_idx, incarnation, conflicts
                );

                // Not valid and successfully aborted, remove the writes before any other
                // transaction is validated against them.
                state.versioned_cache.invalidate(txn_idx);
                Ok(state
                    .scheduler
                    .finish_abort(txn_idx, incarnation, conflicts)?)
            },
        }
    }

    fn worker_loop<S: TStateView>(
        executor_arguments: &E::Argument,
        state: &BlockState<E>,
        base_view: &S,
        maybe_error: &Mutex<Option<BlockExecutionError>>,
    ) {
        let executor = E::init(*executor_arguments);
        let scheduler = &state.scheduler;
        let mut scheduler_task = SchedulerTask::NoTask;

        loop {
            // Only the commit order is decided here, the commit pass applies the writes.
            while scheduler.try_commit().is_some() {}

            let next = match scheduler_task {
                SchedulerTask::ValidationTask((txn_idx, incarnation), wave) => {
                    Self::validate(txn_idx, incarnation, wave, state)
                },
                SchedulerTask::ExecutionTask((txn_idx, incarnation)) => {
                    Self::execute(txn_idx, incarnation, state, &executor, base_view)
                },
                SchedulerTask::NoTask => Ok(scheduler.next_task()),
                SchedulerTask::Done => break,
            };

            scheduler_task = match next {
                Ok(task) => task,
                Err(err) => {
                    let mut maybe_error = maybe_error.lock();
                    if maybe_error.is_none() {
                        info!("[BlockSTM]: Block execution was aborted due to {:?}", err);
                        *maybe_error = Some(err);
                    }
                    scheduler.halt();
                    SchedulerTask::Done
                },
            };
        }
    }

    fn execute_transactions_parallel<S: TStateView>(
        &self,
        executor_arguments: E::Argument,
        state: &BlockState<E>,
        base_view: &S,
    ) -> BlockExecutionResult<()> {
        let _timer = PARALLEL_EXECUTION_SECONDS.start_timer();
        let maybe_error = Mutex::new(None);

        self.executor_thread_pool.scope(|s| {
            for _ in 0..self.config.concurrency_level {
                s.spawn(|_| {
                    Self::worker_loop(&executor_arguments, state, base_view, &maybe_error);
                });
            }
        });

        match maybe_error.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Executes transactions first_idx.. one by one in block order, on top of the
    /// committed prefix. Writes are only published for successful transactions.
    fn execute_transactions_sequential<S: TStateView>(
        executor_arguments: E::Argument,
        state: &BlockState<E>,
        base_view: &S,
        first_idx: TxnIndex,
    ) -> BlockExecutionResult<()> {
        let _timer = SEQUENTIAL_EXECUTION_SECONDS.start_timer();
        let executor = E::init(executor_arguments);

        for txn_idx in first_idx..state.scheduler.num_txns() {
            // Entries left by speculative executions of txn_idx are stale.
            state.versioned_cache.invalidate(txn_idx);
            let incarnation = state.scheduler.incarnate_sequential(txn_idx)?;

            let mut view = TxnView::new(base_view, &state.versioned_cache, txn_idx);
            let status =
                executor.execute_transaction(&mut view, &state.block[txn_idx as usize], txn_idx);
            state.counters.record_execution(incarnation);
            if let Some(err) = view.take_storage_error() {
                return Err(err.into());
            }

            if status.is_success() {
                view.publish(incarnation, true);
            }
            let (reads, write_set) = view.into_parts();
            state
                .last_input_output
                .record(txn_idx, reads, status, write_set);
            state.scheduler.commit_sequential(txn_idx, incarnation)?;
        }
        Ok(())
    }

    /// Takes the output of a committed transaction and settles its entries in the
    /// multi-version data-structure.
    fn finalize_txn(
        txn_idx: TxnIndex,
        state: &BlockState<E>,
    ) -> Result<TxnOutput<E::Output, E::Error>, PanicError> {
        if state.scheduler.committed_incarnation(txn_idx).is_none() {
            return Err(code_invariant_error(format!(
                "[BlockSTM]: Txn {} reached the commit pass without being committed",
                txn_idx
            )));
        }

        let output = state.last_input_output.take_output(txn_idx)?;
        if output.status.is_success() {
            state.versioned_cache.mark_committed(txn_idx)?;
        } else {
            state.versioned_cache.invalidate(txn_idx);
        }
        Ok(output)
    }

    /// The commit pass: applies the writes of successful transactions to the backing
    /// store, strictly in block order.
    fn commit_block<S: StateStore>(
        state: &BlockState<E>,
        store: &mut S,
    ) -> BlockExecutionResult<Vec<TransactionResult<E::Output, E::Error>>> {
        let _timer = COMMIT_SECONDS.start_timer();
        let num_txns = state.scheduler.num_txns();
        let mut results = Vec::with_capacity(num_txns as usize);

        for txn_idx in 0..num_txns {
            let result = match Self::finalize_txn(txn_idx, state) {
                Ok(TxnOutput {
                    status: ExecutionStatus::Success(output),
                    write_set,
                }) => {
                    // The store is not transactional: if this fails, the write sets of
                    // lower transactions stay applied.
                    store.apply_write_set(write_set)?;
                    TransactionResult {
                        outcome: TransactionOutcome::Success(output),
                        writes_applied: true,
                    }
                },
                Ok(TxnOutput {
                    status: ExecutionStatus::Failure(err),
                    ..
                }) => TransactionResult {
                    outcome: TransactionOutcome::Failure(err),
                    writes_applied: false,
                },
                Err(err) => {
                    // Loud in development, force-failed in production.
                    if cfg!(debug_assertions) {
                        panic!("[BlockSTM]: {}", err);
                    }
                    state.versioned_cache.invalidate(txn_idx);
                    TransactionResult {
                        outcome: TransactionOutcome::InvariantViolation(err),
                        writes_applied: false,
                    }
                },
            };
            results.push(result);
        }
        Ok(results)
    }

    fn summarize(state: &BlockState<E>, sequential_fallback_at: Option<TxnIndex>) -> ExecutionSummary {
        let mut incarnation_histogram = BTreeMap::new();
        for txn_idx in 0..state.scheduler.num_txns() {
            if let Some(incarnation) = state.scheduler.committed_incarnation(txn_idx) {
                counters::TXN_INCARNATION.observe(incarnation as f64);
                *incarnation_histogram.entry(incarnation).or_insert(0) += 1;
            }
        }

        ExecutionSummary {
            executions: state.counters.executions.load(Ordering::Relaxed),
            aborts: state.counters.aborts.load(Ordering::Relaxed),
            reexecutions: state.counters.reexecutions.load(Ordering::Relaxed),
            incarnation_histogram,
            sequential_fallback_at,
        }
    }

    /// Executes the block on top of `store` and applies the writes of its successful
    /// transactions to `store`, in block order. The final state is the same as if the
    /// transactions were executed one by one in block order, skipping failed ones.
    pub fn execute_block<S: StateStore>(
        &self,
        executor_arguments: E::Argument,
        block: &[E::Txn],
        store: &mut S,
    ) -> BlockExecutionResult<BlockOutput<E::Output, E::Error>> {
        let num_txns = TxnIndex::try_from(block.len()).map_err(|_| {
            code_invariant_error(format!("Block of {} txns is too large", block.len()))
        })?;
        info!(
            "[BlockSTM]: Executing block of {} txns, concurrency level {}",
            num_txns, self.config.concurrency_level
        );

        let state = BlockState::<E> {
            block,
            versioned_cache: MVHashMap::new(num_txns),
            last_input_output: TxnLastInputOutput::new(num_txns),
            scheduler: Scheduler::new(num_txns, self.config.max_incarnation),
            counters: ExecutionCounters::default(),
        };

        let mut sequential_fallback_at = None;
        {
            let base_view: &S = store;
            if self.config.concurrency_level > 1 && num_txns > 0 {
                self.execute_transactions_parallel(executor_arguments, &state, base_view)?;

                let committed = state.scheduler.num_committed();
                if let Some((txn_idx, incarnation)) = state.scheduler.livelock_at() {
                    info!(
                        "[BlockSTM]: Txn {} hit incarnation {}, executing txns from {} sequentially",
                        txn_idx, incarnation, committed
                    );
                    counters::SEQUENTIAL_FALLBACK_COUNT.inc();
                    sequential_fallback_at = Some(committed);
                }
            }

            let committed = state.scheduler.num_committed();
            if committed < num_txns {
                Self::execute_transactions_sequential(
                    executor_arguments,
                    &state,
                    base_view,
                    committed,
                )?;
            }
        }

        let results = Self::commit_block(&state, store)?;
        let summary = Self::summarize(&state, sequential_fallback_at);
        info!(
            "[BlockSTM]: Block execution completed. {} txns, {} executions, {} aborts",
            num_txns, summary.executions, summary.aborts
        );

        let BlockState {
            versioned_cache,
            last_input_output,
            scheduler,
            ..
        } = state;
        self.executor_thread_pool.spawn(move || {
            // Explicit async drops.
            drop(last_input_output);
            drop(scheduler);
            drop(versioned_cache);
        });

        Ok(BlockOutput { results, summary })
    }
}
