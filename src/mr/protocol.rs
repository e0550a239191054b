//! Wire types and the RPC service contract shared by coordinator and worker.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which kind of task an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Map,
    Reduce,
}

/// The reply to `RequestTask`.
///
/// Only the fields relevant to the returned variant are meaningful; unlike
/// the flat `{taskType, taskIndex, nReduce, nMap, mapFile}` struct in the
/// wire contract this is modeled on, an enum makes the "only meaningful for
/// some variants" relationship a compile-time guarantee instead of a
/// documentation comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskAssignment {
    Map {
        index: usize,
        input_path: PathBuf,
        n_reduce: usize,
    },
    Reduce {
        index: usize,
        n_map: usize,
    },
    Done,
}

/// One emitted key-value pair, encoded as a single JSON object per line in
/// an intermediate file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The coordinator's RPC surface, served over a `tarpc` Unix-domain-socket
/// transport. Three operations: ask for work, report work done, check
/// whether the whole job has finished.
#[tarpc::service]
pub trait Coordination {
    /// Block until a task can be handed out, a straggler task can be
    /// re-issued, or the job is done.
    async fn request_task() -> TaskAssignment;

    /// Report that the task `(kind, index)` has been completed and its
    /// output files renamed into place. Accepted as a no-op if the task was
    /// already finished (the legitimate duplicate-report case). An
    /// out-of-range index is a protocol violation: the coordinator logs it
    /// and exits before replying.
    async fn report_finished(kind: TaskKind, index: usize);

    /// Pure read of whether every map and reduce task has finished.
    async fn is_done() -> bool;
}
