//! Wire protocol types for clusterlink to coordinator communication.
//!
//! The coordinator accepts URL-encoded form posts: transfer status lines on
//! [`constants::OP_STATUS_PATH`] and JSON cluster snapshots on
//! [`constants::CLUSTER_STATUS_PATH`].

pub mod constants;
pub mod jobs;
pub mod messages;

// Re-export primary types for convenience.
pub use jobs::{ClusterSnapshot, JobRunState, JobState};
pub use messages::{ClusterStatusForm, OpStatusForm};
