// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use crossbeam::utils::CachePadded;
use occ_mvhashmap::types::{Incarnation, TxnIndex, Version};
use occ_types::error::{code_invariant_error, PanicError};
use parking_lot::Mutex;
use std::{
    cmp::max,
    collections::BTreeSet,
    sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
};
use tracing::warn;

const TXN_IDX_MASK: u64 = (1 << 32) - 1;

pub type Wave = u32;

/// A holder for potential task returned from the Scheduler. ExecutionTask and ValidationTask
/// each contain a version of transaction that must be executed or validated, respectively.
/// NoTask holds no task (similar None if we wrapped tasks in Option), and Done implies that
/// there are no more tasks and the scheduler is done.
#[derive(Debug, PartialEq, Eq)]
pub enum SchedulerTask {
    ExecutionTask(Version),
    ValidationTask(Version, Wave),
    NoTask,
    Done,
}

/// All possible statuses for each transaction. Each status contains the latest incarnation number.
///
/// 'ReadyToExecute' means that the corresponding incarnation should be executed and the scheduler
/// must eventually create a corresponding execution task. The scheduler ensures that exactly one
/// execution task gets created, changing the status to 'Executing' in the process.
///
/// 'Executing' status of an incarnation turns into 'Executed' when the execution task finishes.
/// An 'Executed' status allows creation of validation tasks for the corresponding incarnation.
/// A successful validation turns it into 'Validated', which still gets re-validated by later
/// validation waves, and a validation failure leads to an abort. The scheduler ensures that
/// there is exactly one abort per incarnation, changing the status to 'Aborting' in the process.
///
/// Once the thread that successfully aborted removed the incarnation's writes, the transaction
/// moves to 'Waiting(incarnation + 1, remaining)' while any of the transactions that caused
/// the conflict is neither validated nor committed. Each of them decrements 'remaining' when it
/// gets validated, and the last one sets the status to 'ReadyToExecute(incarnation + 1)'.
///
/// Only an abort leads to 'Waiting'. A validation without conflicts goes straight to
/// 'Validated' even while lower transactions are still unvalidated: try_commit only
/// commits a transaction once every lower one is committed and no wave triggered by them
/// is pending, so the unresolved dependencies are never observed by a commit.
///
/// Status transition diagram:
/// Ready(i)
///    |  try_incarnate (incarnate successfully)
///    ↓
/// Executing(i)
///    |  finish_execution
///    ↓                  finish_validation                try_commit
/// Executed(i) ----------------------------> Validated(i) ------------> Committed(i)
///    |                                          |
///    |  try_abort (abort successfully)          |  try_abort
///    ↓                                          |
/// Aborting(i) <----------------------------------
///    |  finish_abort
///    ↓                       dependencies resolved
/// Waiting(i+1, n) ---------------------------------------------------> Ready(i+1)
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExecutionStatus {
    ReadyToExecute(Incarnation),
    Executing(Incarnation),
    Executed(Incarnation),
    Validated(Incarnation),
    Aborting(Incarnation),
    Waiting(Incarnation, usize),
    Committed(Incarnation),
}

struct ValidationStatus {
    // Maximum wave that was triggered at the transaction index corresponding to the status.
    max_triggered_wave: Wave,

    // The maximum wave among successful validations of the current incarnation.
    max_validated_wave: Option<Wave>,

    // Additional lower bound on the wave that must be successfully validated in order
    // for the transaction to be committed, required to handle the case of the optimization in
    // finish_execution when only the transaction itself is validated (if the incarnation
    // published no writes).
    required_wave: Wave,
}

impl ValidationStatus {
    pub fn new() -> Self {
        ValidationStatus {
            max_triggered_wave: 0,
            max_validated_wave: None,
            required_wave: 0,
        }
    }
}

pub struct Scheduler {
    /// Number of txns to execute, immutable.
    num_txns: TxnIndex,
    /// Highest incarnation that may be executed in parallel, immutable.
    max_incarnation: Incarnation,

    /// A shared index that tracks the minimum of all transaction indices that require execution.
    /// The threads increment the index and attempt to create an execution task for the corresponding
    /// transaction, if the status of the txn is 'ReadyToExecute'. This implements a counting-based
    /// concurrent ordered set. It is reduced as necessary when transactions become ready to be
    /// executed, in particular, when dependencies of waiting transactions are resolved.
    execution_idx: AtomicU32,
    /// The first 32 bits identifies a validation wave while the last 32 bits contain an index
    /// that tracks the minimum of all transaction indices that require validation.
    /// The threads increment this index and attempt to create a validation task for the
    /// corresponding transaction (if the status of the txn is 'Executed' or 'Validated'),
    /// associated with the observed wave in the first 32 bits. Each validation wave represents
    /// the sequence of validations that must happen due to the fixed serialization order of
    /// transactions. The index is reduced as necessary when transactions require validation,
    /// in particular, after aborts and executions that published writes. This also creates a
    /// new wave of validations, identified by the monotonically increasing index stored in the
    /// first 32 bits.
    validation_idx: AtomicU64,
    /// Next transaction to commit, and sweeping lower bound on the wave of a validation that must
    /// be successful in order to commit the next transaction.
    commit_state: Mutex<(TxnIndex, Wave)>,

    /// Shared marker that is set when all txns are committed or the execution is halted.
    done_marker: AtomicBool,
    /// Set when a transaction would exceed max_incarnation: (txn_idx, incarnation).
    livelock_at: Mutex<Option<Version>>,

    /// An index i maps to indices of other transactions that wait for transaction i, i.e. they
    /// may be re-executed once transaction i is validated.
    txn_dependency: Vec<CachePadded<Mutex<Vec<TxnIndex>>>>,
    /// An index i maps to the most up-to-date status of transaction i.
    txn_status: Vec<CachePadded<(Mutex<ExecutionStatus>, Mutex<ValidationStatus>)>>,
}

/// Public Interfaces for the Scheduler
impl Scheduler {
    pub fn new(num_txns: TxnIndex, max_incarnation: Incarnation) -> Self {
        Self {
            num_txns,
            max_incarnation,
            execution_idx: AtomicU32::new(0),
            validation_idx: AtomicU64::new(0),
            commit_state: Mutex::new((0, 0)),
            done_marker: AtomicBool::new(false),
            livelock_at: Mutex::new(None),
            txn_dependency: (0..num_txns)
                .map(|_| CachePadded::new(Mutex::new(Vec::new())))
                .collect(),
            txn_status: (0..num_txns)
                .map(|_| {
                    CachePadded::new((
                        Mutex::new(ExecutionStatus::ReadyToExecute(0)),
                        Mutex::new(ValidationStatus::new()),
                    ))
                })
                .collect(),
        }
    }

    pub fn num_txns(&self) -> TxnIndex {
        self.num_txns
    }

    /// If successful, returns Some(TxnIndex), the index of committed transaction.
    /// Transactions are committed in order, each once it is validated with a wave that
    /// covers every validation triggered at or below its index.
    pub fn try_commit(&self) -> Option<TxnIndex> {
        let mut commit_state = self.commit_state.lock();
        let idx = commit_state.0;
        if idx == self.num_txns {
            self.done_marker.store(true, Ordering::SeqCst);
            return None;
        }

        if let Some(validation_status) = self.txn_status[idx as usize].1.try_lock() {
            // Acquired the validation status lock, now try the status lock.
            if let Some(mut status) = self.txn_status[idx as usize].0.try_lock() {
                if let ExecutionStatus::Validated(incarnation) = *status {
                    // Status is validated and we are holding the lock.
                    commit_state.1 = max(commit_state.1, validation_status.max_triggered_wave);
                    if let Some(validated_wave) = validation_status.max_validated_wave {
                        if validated_wave >= max(commit_state.1, validation_status.required_wave)
                        {
                            // Can commit.
                            *status = ExecutionStatus::Committed(incarnation);
                            commit_state.0 += 1;
                            return Some(idx);
                        }
                    }
                }
            }
        }
        None
    }

    /// Try to abort version = (txn_idx, incarnation), called upon validation failure.
    /// When the invocation manages to update the status of the transaction, it changes
    /// Executed(incarnation) or Validated(incarnation) => Aborting(incarnation), it returns
    /// true. Otherwise, returns false. Since incarnation numbers never decrease, this also
    /// ensures that the same version may not successfully abort more than once.
    pub fn try_abort(&self, txn_idx: TxnIndex, incarnation: Incarnation) -> bool {
        let mut status = self.txn_status[txn_idx as usize].0.lock();

        match *status {
            ExecutionStatus::Executed(i) | ExecutionStatus::Validated(i) if i == incarnation => {
                *status = ExecutionStatus::Aborting(incarnation);
                true
            },
            _ => false,
        }
    }

    /// Return the next task for the thread.
    pub fn next_task(&self) -> SchedulerTask {
        loop {
            if self.done() {
                // No more tasks.
                return SchedulerTask::Done;
            }

            let (idx_to_validate, _) =
                Self::unpack_validation_idx(self.validation_idx.load(Ordering::Acquire));
            let idx_to_execute = self.execution_idx.load(Ordering::Acquire);

            if idx_to_execute >= self.num_txns && idx_to_validate >= self.num_txns {
                return SchedulerTask::NoTask;
            }

            if idx_to_validate < idx_to_execute {
                if let Some((version_to_validate, wave)) = self.try_validate_next_version() {
                    return SchedulerTask::ValidationTask(version_to_validate, wave);
                }
            } else if let Some(version_to_execute) = self.try_execute_next_version() {
                return SchedulerTask::ExecutionTask(version_to_execute);
            }
        }
    }

    /// Records a successful validation of version (txn_idx, incarnation) with the given
    /// wave. Validations of an incarnation that is no longer current are ignored.
    ///
    /// The first successful validation of an incarnation invokes `on_first_validation` while
    /// holding the status lock, i.e. before the transaction can be aborted again. Afterwards,
    /// transactions waiting for txn_idx are notified. A notified transaction that is not
    /// waiting is an invariant violation.
    pub fn finish_validation(
        &self,
        txn_idx: TxnIndex,
        incarnation: Incarnation,
        wave: Wave,
        on_first_validation: impl FnOnce(),
    ) -> Result<(), PanicError> {
        {
            let mut validation_status = self.txn_status[txn_idx as usize].1.lock();
            let mut status = self.txn_status[txn_idx as usize].0.lock();
            match *status {
                ExecutionStatus::Executed(i) if i == incarnation => {
                    on_first_validation();
                    *status = ExecutionStatus::Validated(incarnation);
                },
                ExecutionStatus::Validated(i) if i == incarnation => {},
                _ => return Ok(()),
            }

            let max_wave = match validation_status.max_validated_wave {
                Some(prev_wave) => max(prev_wave, wave),
                None => wave,
            };
            validation_status.max_validated_wave = Some(max_wave);
        }

        self.resolve_dependents(txn_idx)
    }

    /// After txn is executed, if revalidate_suffix is true, decrease validation_idx to
    /// schedule all higher transactions for (re-)validation. Otherwise, in some cases (if
    /// validation_idx not already lower), return a validation task of the transaction to the
    /// caller (otherwise NoTask).
    pub fn finish_execution(
        &self,
        txn_idx: TxnIndex,
        incarnation: Incarnation,
        revalidate_suffix: bool,
    ) -> Result<SchedulerTask, PanicError> {
        let mut validation_status = self.txn_status[txn_idx as usize].1.lock();
        self.set_executed_status(txn_idx, incarnation)?;

        let (cur_val_idx, cur_wave) =
            Self::unpack_validation_idx(self.validation_idx.load(Ordering::Acquire));

        // If validation_idx is already lower than txn_idx, all required transactions will be
        // considered for validation, and there is nothing to do.
        if cur_val_idx > txn_idx {
            if revalidate_suffix {
                // The incarnation published writes, which may invalidate reads of any
                // higher transaction.
                if let Some(wave) = self.decrease_validation_idx(txn_idx) {
                    // Under lock, current wave monotonically increasing, can simply write.
                    validation_status.max_triggered_wave = wave;
                }
            } else {
                // Only transaction txn_idx requires validation. Return validation task
                // back to the caller.
                // Under lock, current wave is monotonically increasing, can simply write.
                validation_status.required_wave = cur_wave;
                return Ok(SchedulerTask::ValidationTask(
                    (txn_idx, incarnation),
                    cur_wave,
                ));
            }
        }

        Ok(SchedulerTask::NoTask)
    }

    /// Finalize an abort of version (txn_idx, incarnation), after its writes have been
    /// removed. The next incarnation waits until every transaction in `dependencies` is
    /// validated or committed. May return a re-execution task back to the caller (otherwise,
    /// NoTask). If the next incarnation would exceed the maximum, the execution is halted
    /// and Done is returned.
    pub fn finish_abort(
        &self,
        txn_idx: TxnIndex,
        incarnation: Incarnation,
        dependencies: BTreeSet<TxnIndex>,
    ) -> Result<SchedulerTask, PanicError> {
        let mut validation_status = self.txn_status[txn_idx as usize].1.lock();

        // Schedule higher txns for validation, could skip txn_idx itself (needs to be
        // re-executed first), but used to couple with the locked validation status -
        // should never attempt to commit until validation status is updated.
        if let Some(wave) = self.decrease_validation_idx(txn_idx) {
            // Under lock, current wave monotonically increasing, can simply write.
            validation_status.max_triggered_wave = wave;
        }

        let new_incarnation = incarnation + 1;
        if new_incarnation > self.max_incarnation {
            self.set_aborted_status(
                txn_idx,
                incarnation,
                ExecutionStatus::ReadyToExecute(new_incarnation),
            )?;
            warn!(
                "[BlockSTM]: Txn {} reached incarnation {} (max {}), halting parallel execution",
                txn_idx, new_incarnation, self.max_incarnation
            );
            let mut livelock_at = self.livelock_at.lock();
            if livelock_at.is_none() {
                *livelock_at = Some((txn_idx, new_incarnation));
            }
            drop(livelock_at);
            self.halt();
            return Ok(SchedulerTask::Done);
        }

        // The extra count is released below, after all dependencies are registered.
        self.set_aborted_status(
            txn_idx,
            incarnation,
            ExecutionStatus::Waiting(new_incarnation, 1),
        )?;
        for dep_idx in dependencies {
            if dep_idx >= txn_idx {
                return Err(code_invariant_error(format!(
                    "Txn {} can not depend on txn {}",
                    txn_idx, dep_idx
                )));
            }
            self.add_dependency(txn_idx, dep_idx);
        }

        if self.resolve_dependency(txn_idx)?
            && self.execution_idx.load(Ordering::Acquire) > txn_idx
        {
            // Optimization: execution_idx is higher than txn_idx, but decreasing it may
            // lead to wasted work for all indices between txn_idx and execution_idx.
            // Instead, attempt to create a new incarnation and return the corresponding
            // re-execution task back to the caller. If incarnation fails, there is
            // nothing to do, as another thread must have succeeded to incarnate and
            // obtain the task for re-execution.
            if let Some(new_incarnation) = self.try_incarnate(txn_idx) {
                return Ok(SchedulerTask::ExecutionTask((txn_idx, new_incarnation)));
            }
        }

        Ok(SchedulerTask::NoTask)
    }

    /// Stops handing out tasks. Tasks that are already running finish normally.
    pub fn halt(&self) {
        self.done_marker.store(true, Ordering::SeqCst);
    }

    /// The transaction and incarnation at which parallel execution was abandoned, if any.
    pub fn livelock_at(&self) -> Option<Version> {
        *self.livelock_at.lock()
    }

    /// Number of transactions committed so far, i.e. the committed prefix of the block.
    pub fn num_committed(&self) -> TxnIndex {
        self.commit_state.lock().0
    }

    pub fn committed_incarnation(&self, txn_idx: TxnIndex) -> Option<Incarnation> {
        match *self.txn_status[txn_idx as usize].0.lock() {
            ExecutionStatus::Committed(incarnation) => Some(incarnation),
            _ => None,
        }
    }

    /// Creates the next incarnation of a transaction for sequential execution. Only valid
    /// once no worker is running anymore.
    pub fn incarnate_sequential(&self, txn_idx: TxnIndex) -> Result<Incarnation, PanicError> {
        let mut status = self.txn_status[txn_idx as usize].0.lock();
        let incarnation = match *status {
            ExecutionStatus::ReadyToExecute(i) | ExecutionStatus::Waiting(i, _) => i,
            ExecutionStatus::Executed(i)
            | ExecutionStatus::Validated(i)
            | ExecutionStatus::Aborting(i) => i + 1,
            ExecutionStatus::Executing(_) | ExecutionStatus::Committed(_) => {
                return Err(code_invariant_error(format!(
                    "Unexpected status {:?} of txn {} for sequential execution",
                    *status, txn_idx
                )));
            },
        };
        *status = ExecutionStatus::Executing(incarnation);
        Ok(incarnation)
    }

    /// Commits a sequentially executed transaction, which must be the next one to commit.
    pub fn commit_sequential(
        &self,
        txn_idx: TxnIndex,
        incarnation: Incarnation,
    ) -> Result<(), PanicError> {
        let mut commit_state = self.commit_state.lock();
        let mut status = self.txn_status[txn_idx as usize].0.lock();
        if commit_state.0 != txn_idx || *status != ExecutionStatus::Executing(incarnation) {
            return Err(code_invariant_error(format!(
                "Can not commit txn {} with status {:?}, next to commit is {}",
                txn_idx, *status, commit_state.0
            )));
        }
        *status = ExecutionStatus::Committed(incarnation);
        commit_state.0 += 1;
        Ok(())
    }
}

/// Private functions of the Scheduler
impl Scheduler {
    fn unpack_validation_idx(validation_idx: u64) -> (TxnIndex, Wave) {
        (
            (validation_idx & TXN_IDX_MASK) as TxnIndex,
            (validation_idx >> 32) as Wave,
        )
    }

    /// Decreases the validation index, adjusting the wave and validation status as needed.
    fn decrease_validation_idx(&self, target_idx: TxnIndex) -> Option<Wave> {
        if let Ok(prev_val_idx) =
            self.validation_idx
                .fetch_update(Ordering::Acquire, Ordering::SeqCst, |val_idx| {
                    let (txn_idx, wave) = Self::unpack_validation_idx(val_idx);
                    if txn_idx > target_idx {
                        // Pack into validation index.
                        Some((target_idx as u64) | ((wave as u64 + 1) << 32))
                    } else {
                        None
                    }
                })
        {
            let (_, wave) = Self::unpack_validation_idx(prev_val_idx);
            Some(wave + 1)
        } else {
            None
        }
    }

    /// Try and incarnate a transaction. Only possible when the status is
    /// ReadyToExecute(incarnation), in which case Some(incarnation) is returned and the
    /// status is (atomically, due to the mutex) updated to Executing(incarnation).
    /// An unsuccessful incarnation returns None. Since incarnation numbers never decrease
    /// for each transaction, incarnate function may not succeed more than once per version.
    fn try_incarnate(&self, txn_idx: TxnIndex) -> Option<Incarnation> {
        if txn_idx >= self.num_txns {
            return None;
        }

        let mut status = self.txn_status[txn_idx as usize].0.lock();
        if let ExecutionStatus::ReadyToExecute(incarnation) = *status {
            *status = ExecutionStatus::Executing(incarnation);
            Some(incarnation)
        } else {
            None
        }
    }

    /// If the last incarnation of the transaction finished executing and was not aborted,
    /// returns Some(incarnation), otherwise returns None. Useful to determine when a
    /// transaction can be (re-)validated.
    fn executed_incarnation(&self, txn_idx: TxnIndex) -> Option<Incarnation> {
        if txn_idx >= self.num_txns {
            return None;
        }

        match *self.txn_status[txn_idx as usize].0.lock() {
            ExecutionStatus::Executed(incarnation) | ExecutionStatus::Validated(incarnation) => {
                Some(incarnation)
            },
            _ => None,
        }
    }

    /// Whether transactions waiting for txn_idx may proceed.
    fn is_resolved(&self, txn_idx: TxnIndex) -> bool {
        matches!(
            *self.txn_status[txn_idx as usize].0.lock(),
            ExecutionStatus::Validated(_) | ExecutionStatus::Committed(_)
        )
    }

    /// Grab an index to try and validate next (by fetch-and-incrementing validation_idx).
    /// - If the index is out of bounds, return None (and invoke a check of whether
    /// all txns can be committed).
    /// - If the transaction is ready for validation (Executed or Validated state), return
    /// the version to the caller.
    /// - Otherwise, return None.
    fn try_validate_next_version(&self) -> Option<(Version, Wave)> {
        let (idx_to_validate, wave) =
            Self::unpack_validation_idx(self.validation_idx.fetch_add(1, Ordering::SeqCst));

        // If incarnation was last executed, and thus ready for validation,
        // return version and wave for validation task, otherwise None.
        self.executed_incarnation(idx_to_validate)
            .map(|incarnation| ((idx_to_validate, incarnation), wave))
    }

    /// Grab an index to try and execute next (by fetch-and-incrementing execution_idx).
    /// - If the index is out of bounds, return None (and invoke a check of whether
    /// all txns can be committed).
    /// - If the transaction is ready for execution (ReadyToExecute state), attempt
    /// to create the next incarnation (should happen exactly once), and if successful,
    /// return the version to the caller for the corresponding ExecutionTask.
    /// - Otherwise, return None.
    fn try_execute_next_version(&self) -> Option<Version> {
        let idx_to_execute = self.execution_idx.fetch_add(1, Ordering::SeqCst);

        // If successfully incarnated (changed status from ready to executing),
        // return version for execution task, otherwise None.
        self.try_incarnate(idx_to_execute)
            .map(|incarnation| (idx_to_execute, incarnation))
    }

    /// Makes waiting transaction txn_idx wait for dep_idx as well, unless dep_idx is
    /// already resolved. Registration happens under the dependency lock, which is also
    /// taken to notify dependents after dep_idx is validated, so no notification is lost.
    fn add_dependency(&self, txn_idx: TxnIndex, dep_idx: TxnIndex) -> bool {
        let mut stored_deps = self.txn_dependency[dep_idx as usize].lock();

        // Note: acquires status mutexes while holding the dependency mutex. Status mutexes
        // are never held while acquiring a dependency mutex, hence this may not deadlock.
        if self.is_resolved(dep_idx) {
            return false;
        }

        if let ExecutionStatus::Waiting(_, remaining) =
            &mut *self.txn_status[txn_idx as usize].0.lock()
        {
            *remaining += 1;
        }
        stored_deps.push(txn_idx);
        true
    }

    /// Notifies all transactions waiting for txn_idx, and schedules the ones that are
    /// no longer waiting for execution.
    fn resolve_dependents(&self, txn_idx: TxnIndex) -> Result<(), PanicError> {
        let txn_deps: Vec<TxnIndex> = {
            let mut stored_deps = self.txn_dependency[txn_idx as usize].lock();
            // Holding the lock, take dependency vector.
            std::mem::take(&mut stored_deps)
        };

        let mut min_ready: Option<TxnIndex> = None;
        for dep in txn_deps {
            if self.resolve_dependency(dep)? {
                min_ready = Some(min_ready.map_or(dep, |idx| idx.min(dep)));
            }
        }
        if let Some(execution_target_idx) = min_ready {
            // Decrease the execution index as necessary to ensure resolved dependencies
            // get a chance to be re-executed.
            self.execution_idx
                .fetch_min(execution_target_idx, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Decrements the number of unresolved dependencies of a waiting transaction. Returns
    /// true if the transaction became ready to execute.
    fn resolve_dependency(&self, txn_idx: TxnIndex) -> Result<bool, PanicError> {
        let mut status = self.txn_status[txn_idx as usize].0.lock();
        match *status {
            ExecutionStatus::Waiting(incarnation, 1) => {
                *status = ExecutionStatus::ReadyToExecute(incarnation);
                Ok(true)
            },
            ExecutionStatus::Waiting(incarnation, remaining) if remaining > 1 => {
                *status = ExecutionStatus::Waiting(incarnation, remaining - 1);
                Ok(false)
            },
            _ => Err(code_invariant_error(format!(
                "Resolving a dependency of txn {} with status {:?}",
                txn_idx, *status
            ))),
        }
    }

    /// Set status of the transaction to Executed(incarnation).
    fn set_executed_status(
        &self,
        txn_idx: TxnIndex,
        incarnation: Incarnation,
    ) -> Result<(), PanicError> {
        let mut status = self.txn_status[txn_idx as usize].0.lock();

        // Only makes sense when the current status is 'Executing'.
        if *status != ExecutionStatus::Executing(incarnation) {
            return Err(code_invariant_error(format!(
                "Finishing execution of txn {} incarnation {} with status {:?}",
                txn_idx, incarnation, *status
            )));
        }

        *status = ExecutionStatus::Executed(incarnation);
        Ok(())
    }

    /// After a successful abort, move the transaction to the given status (waiting for
    /// dependencies or ready for the next incarnation).
    fn set_aborted_status(
        &self,
        txn_idx: TxnIndex,
        incarnation: Incarnation,
        new_status: ExecutionStatus,
    ) -> Result<(), PanicError> {
        let mut status = self.txn_status[txn_idx as usize].0.lock();

        // Only makes sense when the current status is 'Aborting'.
        if *status != ExecutionStatus::Aborting(incarnation) {
            return Err(code_invariant_error(format!(
                "Finishing abort of txn {} incarnation {} with status {:?}",
                txn_idx, incarnation, *status
            )));
        }

        *status = new_status;
        Ok(())
    }

    /// Checks whether the done marker is set. The marker can only be set by 'try_commit'
    /// or 'halt'.
    fn done(&self) -> bool {
        self.done_marker.load(Ordering::Acquire)
    }
}
