use std::collections::BTreeMap;

use tokio::time::Instant;

use clusterlink_protocol::{JobRunState, JobState};

use crate::api::ObservedJob;

struct TrackedJob {
    state: JobState,
    started_at: Instant,
    /// Set once, on the first terminal sighting.
    finished_at: Option<Instant>,
}

impl TrackedJob {
    fn new(id: String, now: Instant) -> Self {
        Self {
            state: JobState {
                id,
                status: JobRunState::Prep,
                failure_info: None,
                map_progress: 0.0,
                reduce_progress: 0.0,
                elapsed_seconds: 0,
            },
            started_at: now,
            finished_at: None,
        }
    }

    fn update(&mut self, job: &ObservedJob, now: Instant) {
        self.state.status = job.state;
        if self.finished_at.is_none() {
            self.state.elapsed_seconds = now.saturating_duration_since(self.started_at).as_secs();
            if job.state.is_terminal() {
                self.finished_at = Some(now);
            }
        }
        self.state.failure_info = job.failure_info.clone();
        self.state.map_progress = job.map_progress.clamp(0.0, 1.0);
        self.state.reduce_progress = job.reduce_progress.clamp(0.0, 1.0);
    }
}

/// Every job seen since startup, keyed by job id.
///
/// Elapsed time counts from the first sighting and freezes once the job is
/// terminal. Entries are never removed.
#[derive(Default)]
pub struct JobStateTracker {
    jobs: BTreeMap<String, TrackedJob>,
}

impl JobStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a newly seen job or updates a known one in place.
    pub fn upsert(&mut self, job: &ObservedJob, now: Instant) {
        self.jobs
            .entry(job.id.clone())
            .or_insert_with(|| TrackedJob::new(job.id.clone(), now))
            .update(job, now);
    }

    /// Copies the current states, ordered by job id.
    pub fn snapshot(&self) -> Vec<JobState> {
        self.jobs.values().map(|t| t.state.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&JobState> {
        self.jobs.get(id).map(|t| &t.state)
    }

    /// When the job was first seen in a terminal state.
    pub fn finished_at(&self, id: &str) -> Option<Instant> {
        self.jobs.get(id).and_then(|t| t.finished_at)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
