//! The worker: long-lived loop that asks the coordinator for tasks,
//! executes them with the user-supplied map/reduce functions, and commits
//! output files atomically.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tarpc::context;

use crate::mr::error::WorkerError;
use crate::mr::function::{MapFn, ReduceFn};
use crate::mr::hash;
use crate::mr::job::{DEFAULT_TICK, DEFAULT_TIMEOUT};
use crate::mr::protocol::{CoordinationClient, KeyValue, TaskAssignment, TaskKind};

/// Slack added on top of the coordinator's own worst-case suspend time
/// (`DEFAULT_TIMEOUT` until a stale task goes eligible, plus one
/// `DEFAULT_TICK` housekeeping wake) before the RPC deadline.
const REQUEST_TASK_DEADLINE_SLACK: std::time::Duration = std::time::Duration::from_secs(5);

/// `RequestTask` may legitimately stay blocked for close to
/// `DEFAULT_TIMEOUT + DEFAULT_TICK` (the spec allows an arbitrarily long
/// block). `context::current()`'s default deadline is 10s, which that wait
/// can exceed — the client would cancel the call out from under a reply the
/// coordinator was about to send correctly. Give this call specifically a
/// deadline that can't fire before the coordinator's own suspend bound does.
fn request_task_context() -> context::Context {
    let mut ctx = context::current();
    ctx.deadline = SystemTime::now() + DEFAULT_TIMEOUT + DEFAULT_TICK + REQUEST_TASK_DEADLINE_SLACK;
    ctx
}

/// A long-lived worker process. Holds no task-level state across
/// iterations of `run` beyond what's needed for the single in-flight task —
/// one worker is only ever touched by one OS thread, so nothing here needs
/// synchronization.
pub struct Worker {
    client: CoordinationClient,
    map_fn: Box<dyn MapFn>,
    reduce_fn: Box<dyn ReduceFn>,
    working_dir: PathBuf,
}

impl Worker {
    pub fn new(
        client: CoordinationClient,
        map_fn: Box<dyn MapFn>,
        reduce_fn: Box<dyn ReduceFn>,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            client,
            map_fn,
            reduce_fn,
            working_dir,
        }
    }

    /// Runs the main loop forever: ask for a task, execute it, report it
    /// done. Returns when the coordinator replies `Done`. Any execution
    /// error is fatal per the spec — logged, and the process exits without
    /// reporting, leaving the coordinator to re-issue the task after
    /// timeout.
    pub async fn run(&self) -> anyhow::Result<()> {
        loop {
            let assignment = self
                .client
                .request_task(request_task_context())
                .await
                .map_err(|e| WorkerError::Transport(e.into()))?;

            match assignment {
                TaskAssignment::Map {
                    index,
                    input_path,
                    n_reduce,
                } => {
                    if let Err(e) = self.execute_map(index, &input_path, n_reduce) {
                        tracing::error!(index, error = %e, "map task failed, exiting without reporting");
                        anyhow::bail!(e);
                    }
                    self.client
                        .report_finished(context::current(), TaskKind::Map, index)
                        .await
                        .map_err(|e| WorkerError::Transport(e.into()))?;
                }
                TaskAssignment::Reduce { index, n_map } => {
                    if let Err(e) = self.execute_reduce(index, n_map) {
                        tracing::error!(index, error = %e, "reduce task failed, exiting without reporting");
                        anyhow::bail!(e);
                    }
                    self.client
                        .report_finished(context::current(), TaskKind::Reduce, index)
                        .await
                        .map_err(|e| WorkerError::Transport(e.into()))?;
                }
                TaskAssignment::Done => {
                    tracing::info!("job finished, worker exiting");
                    return Ok(());
                }
            }
        }
    }

    fn intermediate_path(&self, m: usize, r: usize) -> PathBuf {
        self.working_dir.join(format!("mr-{m}-{r}"))
    }

    fn output_path(&self, r: usize) -> PathBuf {
        self.working_dir.join(format!("mr-out-{r}"))
    }

    /// Step 1-5 of "Execute Map": read the input, call the user map
    /// function, bucket emitted pairs by partition into scratch files, and
    /// atomically rename each scratch file into its final `mr-{m}-{p}` path.
    fn execute_map(&self, m: usize, path: &Path, n_reduce: usize) -> Result<(), WorkerError> {
        let contents = std::fs::read_to_string(path).map_err(|e| WorkerError::ReadInput {
            path: path.to_path_buf(),
            source: e,
        })?;

        let filename = path.to_string_lossy();
        let emitted = self.map_fn.call(&filename, &contents);

        let mut scratch: Vec<tempfile::NamedTempFile> = (0..n_reduce)
            .map(|_| tempfile::NamedTempFile::new_in(&self.working_dir))
            .collect::<std::io::Result<_>>()
            .map_err(WorkerError::WriteIntermediate)?;

        for kv in &emitted {
            let p = hash::partition(&kv.key, n_reduce);
            let line = serde_json::to_string(kv).map_err(|e| WorkerError::MalformedRecord {
                path: self.intermediate_path(m, p),
                detail: e.to_string(),
            })?;
            writeln!(scratch[p].as_file_mut(), "{line}").map_err(WorkerError::WriteIntermediate)?;
        }

        for (p, file) in scratch.into_iter().enumerate() {
            file.persist(self.intermediate_path(m, p))
                .map_err(|e| WorkerError::CommitOutput(e.error))?;
        }

        tracing::debug!(m, n_reduce, emitted = emitted.len(), "map task committed");
        Ok(())
    }

    /// Step 1-4 of "Execute Reduce": read every mapper's partition file for
    /// `r`, sort by key, call the user reduce function once per distinct
    /// key, and atomically rename the scratch output into `mr-out-{r}`.
    fn execute_reduce(&self, r: usize, n_map: usize) -> Result<(), WorkerError> {
        // BTreeMap keeps output ascending by key with no separate sort step;
        // insertion order within a key (the value list) is whatever order
        // the mappers happened to be read in, which the reduce contract
        // allows since it must be commutative over its values.
        let mut by_key: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for m in 0..n_map {
            let path = self.intermediate_path(m, r);
            let file = std::fs::File::open(&path).map_err(|e| WorkerError::ReadInput {
                path: path.clone(),
                source: e,
            })?;
            for line in std::io::BufReader::new(file).lines() {
                let line = line.map_err(|e| WorkerError::ReadInput {
                    path: path.clone(),
                    source: e,
                })?;
                if line.is_empty() {
                    continue;
                }
                let kv: KeyValue =
                    serde_json::from_str(&line).map_err(|e| WorkerError::MalformedRecord {
                        path: path.clone(),
                        detail: e.to_string(),
                    })?;
                by_key.entry(kv.key).or_default().push(kv.value);
            }
        }

        let mut scratch = tempfile::NamedTempFile::new_in(&self.working_dir)
            .map_err(WorkerError::WriteIntermediate)?;
        for (key, values) in &by_key {
            let result = self.reduce_fn.call(key, values);
            writeln!(scratch.as_file_mut(), "{key} {result}").map_err(WorkerError::WriteIntermediate)?;
        }
        scratch
            .persist(self.output_path(r))
            .map_err(|e| WorkerError::CommitOutput(e.error))?;

        tracing::debug!(r, n_map, keys = by_key.len(), "reduce task committed");
        Ok(())
    }
}
