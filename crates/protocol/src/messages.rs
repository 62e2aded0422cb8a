use serde::{Deserialize, Serialize};

use crate::jobs::ClusterSnapshot;

// ---------------------------------------------------------------------------
// Form payloads
// ---------------------------------------------------------------------------

/// Transfer status update, posted to the op-status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpStatusForm {
    pub state: String,
    pub operation: String,
}

impl OpStatusForm {
    pub fn new(operation: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            operation: operation.into(),
        }
    }
}

/// Cluster snapshot update, posted to the cluster-status endpoint.
///
/// `data` holds the snapshot serialized as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStatusForm {
    pub data: String,
}

impl ClusterStatusForm {
    /// Wraps an already serialized snapshot.
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    /// Serializes `snapshot` into the form payload.
    pub fn from_snapshot(snapshot: &ClusterSnapshot) -> serde_json::Result<Self> {
        Ok(Self::new(snapshot.to_json()?))
    }

    /// Parses the embedded snapshot back (coordinator side).
    pub fn snapshot(&self) -> serde_json::Result<ClusterSnapshot> {
        serde_json::from_str(&self.data)
    }
}
