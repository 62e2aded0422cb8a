//! Non-blocking delivery of progress lines.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::sink::ProgressSink;

/// Default number of progress lines buffered ahead of a slow sink.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

enum Queued {
    Line(String),
    /// Answered once every earlier line was handled.
    Flush(oneshot::Sender<()>),
}

/// Queues progress lines and delivers them from a background task.
///
/// [`submit`](Self::submit) never waits: when the queue is full the line is
/// dropped, since a later line supersedes it anyway. Delivery failures are
/// logged and otherwise ignored. [`flush`](Self::flush) waits for the lines
/// queued so far; [`close`](Self::close) flushes and stops.
pub struct ProgressReporter {
    tx: mpsc::Sender<Queued>,
    task: JoinHandle<()>,
    dropped: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl ProgressReporter {
    /// Spawns the delivery task on the current tokio runtime.
    ///
    /// A `capacity` of 0 uses [`DEFAULT_QUEUE_CAPACITY`].
    pub fn spawn(sink: Arc<dyn ProgressSink>, capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            capacity
        };
        let (tx, mut rx) = mpsc::channel::<Queued>(capacity);
        let failed = Arc::new(AtomicU64::new(0));
        let failed_task = Arc::clone(&failed);

        let task = tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                match item {
                    Queued::Line(message) => {
                        if let Err(e) = sink.report(&message).await {
                            failed_task.fetch_add(1, Ordering::Relaxed);
                            warn!(error = %e, "failed to deliver progress update");
                        }
                    }
                    Queued::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self {
            tx,
            task,
            dropped: Arc::new(AtomicU64::new(0)),
            failed,
        }
    }

    /// Queues a line for delivery. Returns `false` if it was dropped.
    pub fn submit(&self, message: String) -> bool {
        match self.tx.try_send(Queued::Line(message)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(Queued::Line(message))) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(%message, "progress queue full, dropping update");
                false
            }
            Err(_) => false,
        }
    }

    /// Waits until every line submitted so far was handled.
    ///
    /// Unlike [`submit`](Self::submit) this waits for queue space.
    pub async fn flush(&self) {
        let (done, handled) = oneshot::channel();
        if self.tx.send(Queued::Flush(done)).await.is_err() {
            return;
        }
        let _ = handled.await;
    }

    /// Number of lines dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of lines the sink failed to deliver so far.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Stops accepting lines and waits until every queued line was handled.
    pub async fn close(self) {
        let Self {
            tx,
            task,
            dropped,
            failed,
        } = self;
        drop(tx);
        if let Err(e) = task.await {
            warn!(error = %e, "progress delivery task ended abnormally");
        }

        let (dropped, failed) = (dropped.load(Ordering::Relaxed), failed.load(Ordering::Relaxed));
        if dropped > 0 || failed > 0 {
            warn!(dropped, failed, "some progress updates were not delivered");
        }
    }
}
