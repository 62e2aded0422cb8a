//! Cluster job monitoring.
//!
//! [`ClusterPoller`] queries a [`ClusterApi`] on a fixed interval, folds the
//! job list into a [`JobStateTracker`] and sends the resulting
//! [`ClusterSnapshot`](clusterlink_protocol::ClusterSnapshot) through a
//! progress sink. No tick failure ever stops the loop.

mod api;
mod poller;
mod rest;
mod tracker;

pub use api::{ClusterApi, ClusterStatus, ObservedJob, QueryFuture};
pub use poller::{ClusterPoller, TickOutcome};
pub use rest::RestClusterApi;
pub use tracker::JobStateTracker;

/// Failure to query the cluster during a tick.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
