//! Typed error taxonomy for the engine.
//!
//! Library-level errors are `thiserror` enums that distinguish recoverable
//! conditions from protocol violations; the binaries unify everything at the
//! `main` boundary with `anyhow`.

use thiserror::Error;

use crate::mr::protocol::TaskKind;

/// Errors a worker can hit while executing a map or reduce task.
///
/// Every variant here is fatal to the worker process per the spec: on any of
/// these the worker logs and exits without calling `ReportFinished`, relying
/// on the coordinator's timeout to re-issue the task.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to read input file {path}: {source}")]
    ReadInput {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write intermediate file: {0}")]
    WriteIntermediate(#[source] std::io::Error),

    #[error("failed to commit output file: {0}")]
    CommitOutput(#[source] std::io::Error),

    #[error("malformed intermediate record in {path}: {detail}")]
    MalformedRecord {
        path: std::path::PathBuf,
        detail: String,
    },

    #[error("RPC transport failure: {0}")]
    Transport(#[source] anyhow::Error),
}

/// A violation of the RPC protocol contract, detected by the coordinator in
/// `ReportFinished`. These are programming errors, not runtime conditions:
/// the coordinator logs at `error` and exits the process rather than trying
/// to recover.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("report for task index {index} out of range ({kind:?}, valid range is [0, {bound}))")]
    IndexOutOfRange {
        kind: TaskKind,
        index: usize,
        bound: usize,
    },
}
