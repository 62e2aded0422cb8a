use std::fmt;

use serde::{Deserialize, Serialize};

/// Run state of a cluster job, as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobRunState {
    Prep,
    Running,
    Succeeded,
    Failed,
    Killed,
}

impl JobRunState {
    /// Returns `true` once the job can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Killed)
    }

    /// Wire name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prep => "PREP",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        }
    }
}

impl fmt::Display for JobRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked job as sent to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    pub id: String,
    pub status: JobRunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_info: Option<String>,
    /// Map phase completion in `[0, 1]`.
    pub map_progress: f32,
    /// Reduce phase completion in `[0, 1]`.
    pub reduce_progress: f32,
    pub elapsed_seconds: u64,
}

/// Per-tick cluster aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSnapshot {
    pub jobs: Vec<JobState>,
    pub mapreduce_nodes: u32,
    pub map_tasks: u32,
    pub reduce_tasks: u32,
}

impl ClusterSnapshot {
    /// Serializes the snapshot into the JSON document the coordinator expects.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
