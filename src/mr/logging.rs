//! Logging initialization shared by the coordinator and worker binaries.

/// Initialize `tracing` with an `EnvFilter` driven by `RUST_LOG`, defaulting
/// to `info` when unset.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
