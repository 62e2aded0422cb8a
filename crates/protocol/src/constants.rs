use std::time::Duration;

/// Port the coordinator listens on (HTTPS, self-signed certificate).
pub const COORDINATOR_PORT: u16 = 8888;

/// Default coordinator host name inside the cluster network.
pub const COORDINATOR_HOST: &str = "coordinator";

/// Endpoint receiving per-operation transfer status lines.
pub const OP_STATUS_PATH: &str = "/instance/op_status";

/// Endpoint receiving serialized cluster snapshots.
pub const CLUSTER_STATUS_PATH: &str = "/hadoop/status_update";

/// Form field carrying a transfer status line.
pub const FIELD_STATE: &str = "state";

/// Form field carrying the operation identifier.
pub const FIELD_OPERATION: &str = "operation";

/// Form field carrying a JSON cluster snapshot.
pub const FIELD_DATA: &str = "data";

/// Final status line sent after a successful transfer.
pub const DONE_MESSAGE: &str = "Done";

/// Prefix of the final status line sent after a failed transfer.
pub const ERROR_PREFIX: &str = "Error: ";

/// Default delay between two cluster polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Builds the base URL of a coordinator.
pub fn coordinator_url(host: &str, port: u16) -> String {
    format!("https://{host}:{port}")
}
