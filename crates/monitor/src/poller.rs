use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use clusterlink_protocol::ClusterSnapshot;
use clusterlink_report::ProgressSink;

use crate::api::ClusterApi;
use crate::tracker::JobStateTracker;

/// Shortest accepted poll interval.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A snapshot with `jobs` entries was delivered.
    Reported { jobs: usize },
    /// The cluster could not be queried; nothing changed.
    QueryFailed,
    /// The tracker was updated but the snapshot was not delivered.
    SendFailed,
}

/// Periodically folds cluster state into a tracker and reports it.
pub struct ClusterPoller {
    api: Arc<dyn ClusterApi>,
    sink: Arc<dyn ProgressSink>,
    tracker: JobStateTracker,
    interval: Duration,
}

impl ClusterPoller {
    /// Intervals shorter than one second are raised to one second.
    pub fn new(api: Arc<dyn ClusterApi>, sink: Arc<dyn ProgressSink>, interval: Duration) -> Self {
        Self {
            api,
            sink,
            tracker: JobStateTracker::new(),
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn tracker(&self) -> &JobStateTracker {
        &self.tracker
    }

    /// Runs one query, update and send cycle. Never fails.
    pub async fn tick(&mut self) -> TickOutcome {
        let (status, jobs) = match self.api.query().await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "couldn't query cluster, skipping tick");
                return TickOutcome::QueryFailed;
            }
        };

        let now = Instant::now();
        for job in &jobs {
            self.tracker.upsert(job, now);
        }

        let snapshot = ClusterSnapshot {
            jobs: self.tracker.snapshot(),
            mapreduce_nodes: status.nodes,
            map_tasks: status.map_tasks,
            reduce_tasks: status.reduce_tasks,
        };
        let data = match snapshot.to_json() {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "couldn't serialize cluster snapshot");
                return TickOutcome::SendFailed;
            }
        };

        match self.sink.report(&data).await {
            Ok(()) => {
                debug!(jobs = snapshot.jobs.len(), "cluster snapshot sent");
                TickOutcome::Reported {
                    jobs: snapshot.jobs.len(),
                }
            }
            Err(e) => {
                warn!(error = %e, "couldn't send cluster snapshot");
                TickOutcome::SendFailed
            }
        }
    }

    /// Ticks immediately, then once per interval, until `cancel` fires.
    ///
    /// A tick that overruns the interval delays the following ones instead
    /// of bunching them up. Returns the number of ticks run.
    pub async fn run(&mut self, cancel: CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "cluster monitor started");

        let mut ticks = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                    ticks += 1;
                }
            }
        }

        info!(ticks, jobs = self.tracker.len(), "cluster monitor stopped");
        ticks
    }
}
