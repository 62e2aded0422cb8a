use std::time::Duration;

use tokio::time::Instant;

use crate::MIB;

/// Progress of one copy at a report boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes moved since the copy started.
    pub total_bytes: u64,
    /// Bytes moved since the previous report.
    pub interval_bytes: u64,
    /// When the current interval started.
    pub interval_start: Instant,
    /// When this report was taken.
    pub now: Instant,
}

impl TransferProgress {
    /// Whole mebibytes moved so far.
    pub fn total_mib(&self) -> u64 {
        self.total_bytes / MIB
    }

    /// Wall-clock length of the interval.
    pub fn elapsed(&self) -> Duration {
        self.now.saturating_duration_since(self.interval_start)
    }

    /// Interval throughput in whole MiB/s.
    ///
    /// Returns `None` when less than a millisecond elapsed, where no
    /// meaningful rate exists.
    pub fn rate_mib_per_sec(&self) -> Option<u64> {
        let millis = self.elapsed().as_millis();
        if millis == 0 {
            return None;
        }
        let rate = u128::from(self.interval_bytes) * 1000 / (u128::from(MIB) * millis);
        Some(u64::try_from(rate).unwrap_or(u64::MAX))
    }

    /// Human-readable line, e.g. `xfer gs://b/k: 300 MB (42 MB/s)`.
    pub fn message(&self, label: &str) -> String {
        match self.rate_mib_per_sec() {
            Some(rate) => format!("xfer {label}: {} MB ({rate} MB/s)", self.total_mib()),
            None => format!("xfer {label}: {} MB", self.total_mib()),
        }
    }
}

/// Counts bytes and emits a [`TransferProgress`] every `report_every` bytes.
#[derive(Debug)]
pub struct IntervalMeter {
    report_every: u64,
    total: u64,
    interval: u64,
    reported: u64,
    interval_start: Instant,
}

impl IntervalMeter {
    /// Starts a meter whose first interval begins now.
    pub fn new(report_every: u64) -> Self {
        Self {
            report_every: report_every.max(1),
            total: 0,
            interval: 0,
            reported: 0,
            interval_start: Instant::now(),
        }
    }

    /// Records `bytes` more bytes. Returns a report when the interval
    /// threshold was crossed, and restarts the interval.
    pub fn record(&mut self, bytes: u64) -> Option<TransferProgress> {
        self.total += bytes;
        self.interval += bytes;
        if self.interval < self.report_every {
            return None;
        }

        let now = Instant::now();
        let progress = TransferProgress {
            total_bytes: self.total,
            interval_bytes: self.interval,
            interval_start: self.interval_start,
            now,
        };
        self.reported += self.interval;
        self.interval = 0;
        self.interval_start = now;
        Some(progress)
    }

    /// Bytes recorded so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Bytes covered by emitted reports.
    pub fn reported(&self) -> u64 {
        self.reported
    }
}
