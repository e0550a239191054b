//! The coordinator: owns the job record, serializes access to it behind a
//! single lock, and serves the `Coordination` RPC contract over it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tarpc::context;

use crate::mr::job::{Eligible, Job, DEFAULT_TICK, DEFAULT_TIMEOUT};
use crate::mr::protocol::{Coordination, TaskAssignment, TaskKind};

struct Shared {
    job: Mutex<Job>,
    cond: Condvar,
    timeout: Duration,
}

impl Shared {
    /// Blocking implementation of `RequestTask`. Runs on a blocking-pool
    /// thread (see `Coordinator::request_task`) so that the synchronous
    /// lock/condvar wait never stalls the async reactor.
    fn request_task_blocking(&self) -> TaskAssignment {
        let mut job = self.job.lock();
        loop {
            let now = Instant::now();
            match job.request_eligible(self.timeout, now) {
                Eligible::Map { index, input_path } => {
                    tracing::info!(task = "map", index, ?input_path, "assigned task");
                    return TaskAssignment::Map {
                        index,
                        input_path,
                        n_reduce: job.n_reduce(),
                    };
                }
                Eligible::Reduce { index } => {
                    tracing::info!(task = "reduce", index, "assigned task");
                    return TaskAssignment::Reduce {
                        index,
                        n_map: job.n_map(),
                    };
                }
                Eligible::Done => {
                    return TaskAssignment::Done;
                }
                Eligible::Suspend => {
                    // Release the lock while waiting; re-evaluate the
                    // predicate under the lock once woken. Wakeups come
                    // from ReportFinished, the housekeeping tick, or a
                    // RequestTask that just observed the job finishing.
                    self.cond.wait(&mut job);
                }
            }
        }
    }
}

/// Handle to a running coordinator, cheaply cloneable (one clone is handed
/// to `tarpc` per inbound connection; all clones share the same `Shared`).
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    /// Creates a new coordinator for `map_files` with `n_reduce` reduce
    /// partitions, using the default straggler timeout.
    pub fn new(map_files: Vec<std::path::PathBuf>, n_reduce: usize) -> Self {
        Self::with_timeout(map_files, n_reduce, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        map_files: Vec<std::path::PathBuf>,
        n_reduce: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                job: Mutex::new(Job::new(map_files, n_reduce)),
                cond: Condvar::new(),
                timeout,
            }),
        }
    }

    /// Pure read of whether the job has finished, without going through the
    /// async/blocking-pool machinery `request_task` needs.
    pub fn is_done_sync(&self) -> bool {
        self.shared.job.lock().is_done()
    }

    /// Spawns the once-per-second housekeeping tick that wakes every waiter
    /// so stragglers get re-scanned even if no `ReportFinished` ever arrives
    /// to wake them directly. Returns the task handle so callers can hold
    /// onto it for the coordinator's lifetime.
    pub fn spawn_housekeeping(&self) -> tokio::task::JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(DEFAULT_TICK);
            loop {
                interval.tick().await;
                shared.cond.notify_all();
            }
        })
    }
}

#[tarpc::server]
impl Coordination for Coordinator {
    async fn request_task(self, _: context::Context) -> TaskAssignment {
        let shared = Arc::clone(&self.shared);
        // tarpc handlers run on the async runtime; parking_lot's Condvar is
        // a blocking primitive, so the wait loop has to live on a blocking
        // thread rather than tie up a reactor worker.
        tokio::task::spawn_blocking(move || shared.request_task_blocking())
            .await
            .expect("request_task blocking task panicked")
    }

    async fn report_finished(self, _: context::Context, kind: TaskKind, index: usize) {
        let changed = {
            let mut job = self.shared.job.lock();
            match job.report_finished(kind, index) {
                Ok(changed) => changed,
                Err(violation) => {
                    tracing::error!(?violation, "protocol violation in ReportFinished");
                    std::process::exit(1);
                }
            }
        };
        if changed {
            tracing::info!(?kind, index, "task finished");
        } else {
            tracing::debug!(?kind, index, "duplicate finish report, ignored");
        }
        // Wake waiters regardless: a finish can open up the next task in
        // this phase, or flip Map -> Reduce / Reduce -> Done.
        self.shared.cond.notify_all();
    }

    async fn is_done(self, _: context::Context) -> bool {
        self.shared.job.lock().is_done()
    }
}
