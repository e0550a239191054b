use clap::Parser;
use mr_engine::mr::endpoint;
use mr_engine::mr::function::App;
use mr_engine::mr::logging;
use mr_engine::mr::protocol::CoordinationClient;
use mr_engine::mr::worker::Worker;
use tarpc::{client, tokio_serde::formats::Json};

/// Long-lived worker: asks the coordinator for map/reduce tasks, executes
/// them with the selected application's functions, and exits once the
/// coordinator reports the job done.
#[derive(Parser)]
#[command(name = "mrworker")]
struct Args {
    /// Which built-in map/reduce application to run.
    #[arg(long, value_enum, default_value = "wordcount")]
    app: App,

    /// Working directory shared with the coordinator and other workers.
    #[arg(long, default_value = ".")]
    working_dir: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let args = Args::parse();

    let socket_path = endpoint::socket_path();
    let transport = tarpc::serde_transport::unix::connect(&socket_path, Json::default).await?;
    let client = CoordinationClient::new(client::Config::default(), transport).spawn();

    tracing::info!(socket = %socket_path.display(), "worker connected");

    let worker = Worker::new(client, args.app.map_fn(), args.app.reduce_fn(), args.working_dir);
    worker.run().await
}
