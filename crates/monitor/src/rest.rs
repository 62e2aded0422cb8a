//! Cluster queries over the resource manager's REST API.
//!
//! Node count comes from `/ws/v1/cluster/metrics`; jobs and task counts come
//! from `/ws/v1/mapreduce/jobs`.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use clusterlink_protocol::JobRunState;

use crate::QueryError;
use crate::api::{ClusterApi, ClusterStatus, ObservedJob, QueryFuture};

const METRICS_PATH: &str = "/ws/v1/cluster/metrics";
const JOBS_PATH: &str = "/ws/v1/mapreduce/jobs";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsResponse {
    cluster_metrics: ClusterMetrics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterMetrics {
    #[serde(default)]
    active_nodes: u32,
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    /// `null` when the cluster has no jobs.
    #[serde(default)]
    jobs: Option<JobList>,
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    job: Vec<RawJob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJob {
    id: String,
    state: String,
    /// Percent.
    #[serde(default)]
    map_progress: f32,
    /// Percent.
    #[serde(default)]
    reduce_progress: f32,
    #[serde(default)]
    maps_total: u32,
    #[serde(default)]
    maps_completed: u32,
    #[serde(default)]
    reduces_total: u32,
    #[serde(default)]
    reduces_completed: u32,
    #[serde(default)]
    diagnostics: String,
}

impl RawJob {
    fn run_state(&self) -> JobRunState {
        parse_run_state(&self.state)
    }

    fn observed(&self) -> ObservedJob {
        ObservedJob {
            id: self.id.clone(),
            state: self.run_state(),
            failure_info: (!self.diagnostics.is_empty()).then(|| self.diagnostics.clone()),
            map_progress: percent_to_fraction(self.map_progress),
            reduce_progress: percent_to_fraction(self.reduce_progress),
        }
    }
}

/// Maps a MapReduce job state onto the coordinator's run states.
fn parse_run_state(state: &str) -> JobRunState {
    match state {
        "NEW" | "INITED" | "SETUP" => JobRunState::Prep,
        "RUNNING" | "COMMITTING" | "FAIL_WAIT" | "FAIL_ABORT" => JobRunState::Running,
        "SUCCEEDED" => JobRunState::Succeeded,
        "FAILED" | "ERROR" => JobRunState::Failed,
        "KILLED" | "KILL_WAIT" | "KILL_ABORT" => JobRunState::Killed,
        other => {
            debug!(state = other, "unknown job state, treating as running");
            JobRunState::Running
        }
    }
}

fn percent_to_fraction(percent: f32) -> f32 {
    if percent.is_nan() {
        return 0.0;
    }
    (percent / 100.0).clamp(0.0, 1.0)
}

/// [`ClusterApi`] backed by the YARN resource manager REST endpoints.
pub struct RestClusterApi {
    http: reqwest::Client,
    base_url: String,
}

impl RestClusterApi {
    /// Creates a client for `base_url` (e.g. `http://jobtracker:8088`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, QueryError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_slice(&resp.bytes().await?)?)
    }

    async fn raw_jobs(&self) -> Result<Vec<RawJob>, QueryError> {
        let resp: JobsResponse = self.get(JOBS_PATH).await?;
        Ok(resp.jobs.map(|j| j.job).unwrap_or_default())
    }

    async fn active_nodes(&self) -> Result<u32, QueryError> {
        let metrics: MetricsResponse = self.get(METRICS_PATH).await?;
        Ok(metrics.cluster_metrics.active_nodes)
    }
}

/// Node count plus tasks still outstanding in non-terminal jobs.
fn cluster_status(nodes: u32, jobs: &[RawJob]) -> ClusterStatus {
    let mut status = ClusterStatus {
        nodes,
        ..ClusterStatus::default()
    };
    for job in jobs.iter().filter(|j| !j.run_state().is_terminal()) {
        status.map_tasks += job.maps_total.saturating_sub(job.maps_completed);
        status.reduce_tasks += job.reduces_total.saturating_sub(job.reduces_completed);
    }
    status
}

impl ClusterApi for RestClusterApi {
    fn cluster_status(&self) -> QueryFuture<'_, ClusterStatus> {
        Box::pin(async move {
            let nodes = self.active_nodes().await?;
            let jobs = self.raw_jobs().await?;
            Ok(cluster_status(nodes, &jobs))
        })
    }

    fn all_jobs(&self) -> QueryFuture<'_, Vec<ObservedJob>> {
        Box::pin(async move { Ok(self.raw_jobs().await?.iter().map(RawJob::observed).collect()) })
    }

    /// One metrics request and one job list request; the task counts come
    /// from the same list the jobs do.
    fn query(&self) -> QueryFuture<'_, (ClusterStatus, Vec<ObservedJob>)> {
        Box::pin(async move {
            let nodes = self.active_nodes().await?;
            let jobs = self.raw_jobs().await?;
            let status = cluster_status(nodes, &jobs);
            Ok((status, jobs.iter().map(RawJob::observed).collect()))
        })
    }
}
