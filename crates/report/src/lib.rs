//! Status reporting for transfers and cluster snapshots.
//!
//! A [`ProgressSink`] delivers one human-readable line (or a JSON snapshot)
//! somewhere: standard output for local runs, or the coordinator over HTTPS.
//! [`ProgressReporter`] puts a bounded queue in front of a sink so that a slow
//! coordinator never stalls the caller.

mod coordinator;
mod reporter;
mod sink;

pub use coordinator::{ClusterStatusSink, CoordinatorClient, OpStatusSink};
pub use reporter::{DEFAULT_QUEUE_CAPACITY, ProgressReporter};
pub use sink::{ProgressSink, SinkFuture, StdoutSink};

/// Errors produced while delivering a status update.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("coordinator replied {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
