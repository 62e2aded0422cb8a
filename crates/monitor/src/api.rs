use std::future::Future;
use std::pin::Pin;

use clusterlink_protocol::JobRunState;

use crate::QueryError;

/// Boxed future returned by [`ClusterApi`] queries.
pub type QueryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, QueryError>> + Send + 'a>>;

/// Cluster-wide counters at query time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStatus {
    /// Nodes able to run tasks.
    pub nodes: u32,
    /// Map tasks not yet completed.
    pub map_tasks: u32,
    /// Reduce tasks not yet completed.
    pub reduce_tasks: u32,
}

/// A job as reported by the cluster in one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedJob {
    pub id: String,
    pub state: JobRunState,
    pub failure_info: Option<String>,
    /// Fraction in `[0, 1]`.
    pub map_progress: f32,
    /// Fraction in `[0, 1]`.
    pub reduce_progress: f32,
}

impl ObservedJob {
    /// A job with no progress and no failure detail.
    pub fn new(id: impl Into<String>, state: JobRunState) -> Self {
        Self {
            id: id.into(),
            state,
            failure_info: None,
            map_progress: 0.0,
            reduce_progress: 0.0,
        }
    }

    pub fn with_progress(mut self, map: f32, reduce: f32) -> Self {
        self.map_progress = map;
        self.reduce_progress = reduce;
        self
    }

    pub fn with_failure(mut self, info: impl Into<String>) -> Self {
        self.failure_info = Some(info.into());
        self
    }
}

/// The job execution service being monitored.
pub trait ClusterApi: Send + Sync {
    fn cluster_status(&self) -> QueryFuture<'_, ClusterStatus>;

    /// Every job the cluster still knows about, finished ones included.
    fn all_jobs(&self) -> QueryFuture<'_, Vec<ObservedJob>>;

    /// Counters and job list for one tick.
    ///
    /// Implementations that derive the counters from the job list should
    /// override this so both come from the same response.
    fn query(&self) -> QueryFuture<'_, (ClusterStatus, Vec<ObservedJob>)> {
        Box::pin(async move {
            let status = self.cluster_status().await?;
            let jobs = self.all_jobs().await?;
            Ok((status, jobs))
        })
    }
}
