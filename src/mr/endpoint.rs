//! The local transport endpoint: a Unix domain socket path that the
//! coordinator and every worker derive identically, so that multiple users
//! on the same host don't collide.

use std::path::PathBuf;

/// Path of the coordinator's listening socket.
///
/// Scoped by the current OS account name rather than a fixed path, matching
/// the "process-local convention" the wire contract requires both sides to
/// derive the same way.
pub fn socket_path() -> PathBuf {
    std::env::temp_dir().join(format!("mr-coordinator-{}.sock", whoami::username()))
}
