use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use mr_engine::mr::coordinator::Coordinator;
use mr_engine::mr::endpoint;
use mr_engine::mr::logging;
use mr_engine::mr::protocol::Coordination;
use tarpc::server::incoming::Incoming;
use tarpc::tokio_serde::formats::Json;

/// Bound on how long `main` waits, after `is_done_sync()` first observes the
/// job finished, for in-flight RPC handlers to drain before the runtime
/// tears down. A `RequestTask` call that woke on the very `ReportFinished`
/// that just flipped `is_done` is still serializing its `Done` reply at that
/// point and must get to run.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Hands out map and reduce tasks to a pool of worker processes and drives
/// the job to completion, re-issuing tasks whose workers stall or crash.
#[derive(Parser)]
#[command(name = "mrcoordinator")]
struct Args {
    /// Number of reduce partitions.
    #[arg(long = "n-reduce")]
    n_reduce: usize,

    /// Input files to map, in order. `(Map, m)` is responsible for
    /// `inputs[m]`.
    inputs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let args = Args::parse();

    let coordinator = Coordinator::new(args.inputs.clone(), args.n_reduce);
    let _housekeeping = coordinator.spawn_housekeeping();

    let socket_path = endpoint::socket_path();
    // Best-effort: a stale socket file from a previous crashed coordinator
    // would otherwise make the bind fail.
    let _ = std::fs::remove_file(&socket_path);

    let listener = tarpc::serde_transport::unix::listen(&socket_path, Json::default).await?;
    tracing::info!(
        socket = %socket_path.display(),
        n_map = args.inputs.len(),
        n_reduce = args.n_reduce,
        "coordinator listening"
    );

    let active_handlers = Arc::new(AtomicUsize::new(0));

    let server = listener
        .filter_map(|r| async { r.ok() })
        .map(tarpc::server::BaseChannel::with_defaults)
        .map({
            let coordinator = coordinator.clone();
            let active_handlers = Arc::clone(&active_handlers);
            move |channel| {
                let active_handlers = Arc::clone(&active_handlers);
                channel
                    .execute(coordinator.clone().serve())
                    .for_each(move |fut| spawn_tracked(fut, Arc::clone(&active_handlers)))
            }
        });
    tokio::spawn(server.buffer_unordered(usize::MAX).for_each(|()| async {}));

    while !coordinator.is_done_sync() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    // The polling loop above only tells us the job record is done; any
    // RequestTask call that suspended and just woke on the report that
    // flipped is_done still needs to run its blocking-pool continuation and
    // serialize its Done reply. Give outstanding handlers a bounded chance
    // to finish rather than dropping the runtime out from under them.
    let drain_deadline = tokio::time::Instant::now() + SHUTDOWN_DRAIN_TIMEOUT;
    while active_handlers.load(Ordering::SeqCst) > 0 && tokio::time::Instant::now() < drain_deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    tracing::info!("job finished, coordinator exiting");
    Ok(())
}

async fn spawn_tracked(
    fut: impl std::future::Future<Output = ()> + Send + 'static,
    active_handlers: Arc<AtomicUsize>,
) {
    active_handlers.fetch_add(1, Ordering::SeqCst);
    tokio::spawn(async move {
        fut.await;
        active_handlers.fetch_sub(1, Ordering::SeqCst);
    });
}
