//! The job record and its phase/task-set state machine.
//!
//! This module holds no locking or suspension logic itself — it is the pure
//! data structure the coordinator mutates under its lock. Keeping it
//! lock-free and synchronous makes the invariants in the module doc
//! straightforward to unit test without spinning up any RPC machinery.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Default straggler timeout: an in-flight task older than this is eligible
/// for re-issuance.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default housekeeping tick period.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Per-task bookkeeping for one phase (all map tasks, or all reduce tasks).
///
/// `issued_at[i] == None` is the "never issued" sentinel; an explicit
/// optional is clearer than an out-of-band zero timestamp.
#[derive(Debug, Clone)]
struct TaskSet {
    issued_at: Vec<Option<Instant>>,
    finished: Vec<bool>,
}

impl TaskSet {
    fn new(n: usize) -> Self {
        Self {
            issued_at: vec![None; n],
            finished: vec![false; n],
        }
    }

    fn len(&self) -> usize {
        self.finished.len()
    }

    fn all_finished(&self) -> bool {
        self.finished.iter().all(|&f| f)
    }

    /// Ascending scan for the lowest-index task that is unfinished and
    /// either never issued or stale. Returns `None` if no task is currently
    /// eligible (every unfinished task is in-flight and fresh).
    fn find_eligible(&self, timeout: Duration, now: Instant) -> Option<usize> {
        for i in 0..self.len() {
            if self.finished[i] {
                continue;
            }
            let stale = match self.issued_at[i] {
                None => true,
                Some(t) => now.saturating_duration_since(t) > timeout,
            };
            if stale {
                return Some(i);
            }
        }
        None
    }

    fn mark_issued(&mut self, index: usize, now: Instant) {
        self.issued_at[index] = Some(now);
    }

    /// Marks `index` finished. Returns `true` if this call is the one that
    /// transitioned `finished` from `false` to `true`, `false` if the task
    /// was already finished (a legitimate duplicate report, a no-op).
    fn mark_finished(&mut self, index: usize) -> bool {
        if self.finished[index] {
            false
        } else {
            self.finished[index] = true;
            true
        }
    }
}

/// The phase the job is currently in. Map eligibility is always checked
/// before reduce eligibility is ever considered, so no `Reduce` assignment
/// can be handed out while `Phase::Map` still holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Map,
    Reduce,
    Done,
}

/// Outcome of `Job::request_eligible`: either a task to (re-)issue, or a
/// signal that the caller should suspend because nothing is eligible yet but
/// the phase isn't finished, or that the whole job is done.
pub enum Eligible {
    Map { index: usize, input_path: PathBuf },
    Reduce { index: usize },
    Done,
    Suspend,
}

/// The coordinator-owned job record: immutable input file list and
/// partition count, plus the mutable map/reduce task sets and current phase.
#[derive(Debug, Clone)]
pub struct Job {
    map_files: Vec<PathBuf>,
    n_reduce: usize,
    map_tasks: TaskSet,
    reduce_tasks: TaskSet,
    phase: Phase,
}

impl Job {
    /// Builds a new job record. If there are no input files, the map phase
    /// is trivially complete and the job starts directly in `Phase::Reduce`
    /// (boundary case: `nMap == 0`).
    pub fn new(map_files: Vec<PathBuf>, n_reduce: usize) -> Self {
        assert!(n_reduce > 0, "n_reduce must be a positive integer");
        let n_map = map_files.len();
        let phase = if n_map == 0 { Phase::Reduce } else { Phase::Map };
        Self {
            map_tasks: TaskSet::new(n_map),
            reduce_tasks: TaskSet::new(n_reduce),
            map_files,
            n_reduce,
            phase,
        }
    }

    pub fn n_map(&self) -> usize {
        self.map_files.len()
    }

    pub fn n_reduce(&self) -> usize {
        self.n_reduce
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// One step of the assignment algorithm, to be called in a loop by the
    /// coordinator while holding its lock. Advances `phase` when a phase's
    /// task set is fully finished; never blocks itself — the caller decides
    /// what to do with `Eligible::Suspend`.
    pub fn request_eligible(&mut self, timeout: Duration, now: Instant) -> Eligible {
        loop {
            match self.phase {
                Phase::Map => {
                    if let Some(m) = self.map_tasks.find_eligible(timeout, now) {
                        self.map_tasks.mark_issued(m, now);
                        return Eligible::Map {
                            index: m,
                            input_path: self.map_files[m].clone(),
                        };
                    }
                    if self.map_tasks.all_finished() {
                        self.phase = Phase::Reduce;
                        continue;
                    }
                    return Eligible::Suspend;
                }
                Phase::Reduce => {
                    if let Some(r) = self.reduce_tasks.find_eligible(timeout, now) {
                        self.reduce_tasks.mark_issued(r, now);
                        return Eligible::Reduce { index: r };
                    }
                    if self.reduce_tasks.all_finished() {
                        self.phase = Phase::Done;
                        continue;
                    }
                    return Eligible::Suspend;
                }
                Phase::Done => return Eligible::Done,
            }
        }
    }

    /// Marks `(kind, index)` finished. `Err` if `index` is out of range for
    /// `kind` — a protocol violation the caller should treat as fatal.
    /// Returns `Ok(true)` if this call transitioned the task to finished,
    /// `Ok(false)` if it was already finished (accepted no-op).
    pub fn report_finished(
        &mut self,
        kind: crate::mr::protocol::TaskKind,
        index: usize,
    ) -> Result<bool, crate::mr::error::ProtocolViolation> {
        use crate::mr::error::ProtocolViolation;
        use crate::mr::protocol::TaskKind;

        let (set, bound) = match kind {
            TaskKind::Map => (&mut self.map_tasks, self.map_files.len()),
            TaskKind::Reduce => (&mut self.reduce_tasks, self.n_reduce),
        };
        if index >= bound {
            return Err(ProtocolViolation::IndexOutOfRange { kind, index, bound });
        }
        let changed = set.mark_finished(index);

        // Re-check phase transitions: a report can complete the last map
        // task (advancing Map -> Reduce) or the last reduce task
        // (advancing Reduce -> Done), independent of any RequestTask call.
        if self.phase == Phase::Map && self.map_tasks.all_finished() {
            self.phase = Phase::Reduce;
        }
        if self.phase == Phase::Reduce && self.reduce_tasks.all_finished() {
            self.phase = Phase::Done;
        }

        Ok(changed)
    }
}
