use clusterlink_report::ProgressReporter;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::progress::IntervalMeter;
use crate::{DEFAULT_CHUNK_SIZE, DEFAULT_REPORT_EVERY, TransferError};

/// Tunables of the copy loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyConfig {
    /// Bytes requested per read.
    pub chunk_size: usize,
    /// Bytes between two progress reports.
    pub report_every: u64,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            report_every: DEFAULT_REPORT_EVERY,
        }
    }
}

impl CopyConfig {
    /// Replaces zero values with the defaults.
    pub fn normalized(self) -> Self {
        Self {
            chunk_size: if self.chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                self.chunk_size
            },
            report_every: if self.report_every == 0 {
                DEFAULT_REPORT_EVERY
            } else {
                self.report_every
            },
        }
    }
}

/// Outcome of one successful stream copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopySummary {
    /// Bytes written to the destination.
    pub total_bytes: u64,
    /// Bytes covered by progress reports.
    pub reported_bytes: u64,
    /// Number of progress reports emitted.
    pub reports: u32,
}

impl CopySummary {
    /// Bytes moved after the last progress report.
    pub fn unreported_bytes(&self) -> u64 {
        self.total_bytes - self.reported_bytes
    }
}

/// Pumps bytes from a reader into a writer and reports throughput.
#[derive(Debug, Clone, Default)]
pub struct CopyEngine {
    config: CopyConfig,
}

impl CopyEngine {
    pub fn new(config: CopyConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> CopyConfig {
        self.config
    }

    /// Copies `src` into `dst` until `src` is exhausted.
    ///
    /// Both ends are closed on every path: `src` is dropped and `dst` is
    /// shut down, so piped consumers always observe end-of-stream. A read or
    /// write failure aborts the copy with [`TransferError::Stream`].
    pub async fn copy<R, W>(
        &self,
        mut src: R,
        mut dst: W,
        label: &str,
        reporter: &ProgressReporter,
    ) -> Result<CopySummary, TransferError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let result = self.pump(&mut src, &mut dst, label, reporter).await;
        drop(src);

        match result {
            Ok(summary) => {
                dst.shutdown()
                    .await
                    .map_err(|e| TransferError::stream(label, e))?;
                debug!(label, bytes = summary.total_bytes, "copy finished");
                Ok(summary)
            }
            Err(e) => {
                if let Err(close_err) = dst.shutdown().await {
                    debug!(label, error = %close_err, "closing destination after failure");
                }
                Err(e)
            }
        }
    }

    async fn pump<R, W>(
        &self,
        src: &mut R,
        dst: &mut W,
        label: &str,
        reporter: &ProgressReporter,
    ) -> Result<CopySummary, TransferError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; self.config.chunk_size];
        let mut meter = IntervalMeter::new(self.config.report_every);
        let mut reports = 0u32;

        loop {
            let n = src
                .read(&mut buf)
                .await
                .map_err(|e| TransferError::stream(label, e))?;
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n])
                .await
                .map_err(|e| TransferError::stream(label, e))?;

            if let Some(progress) = meter.record(n as u64) {
                reporter.submit(progress.message(label));
                reports += 1;
            }
        }

        Ok(CopySummary {
            total_bytes: meter.total(),
            reported_bytes: meter.reported(),
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use std::time::Duration;

    use clusterlink_report::{ProgressSink, SinkFuture};
    use tokio::io::ReadBuf;

    use crate::MIB;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
    }

    impl ProgressSink for RecordingSink {
        fn report<'a>(&'a self, message: &'a str) -> SinkFuture<'a> {
            Box::pin(async move {
                self.lines.lock().unwrap().push(message.to_string());
                Ok(())
            })
        }
    }

    fn reporter() -> (Arc<RecordingSink>, ProgressReporter) {
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::spawn(sink.clone(), 256);
        (sink, reporter)
    }

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
        }
    }

    /// Writer that records whether it was shut down, optionally failing writes.
    struct TrackingWriter {
        fail_writes: bool,
        closed: Arc<AtomicBool>,
    }

    impl AsyncWrite for TrackingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.fail_writes {
                Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed")))
            } else {
                Poll::Ready(Ok(buf.len()))
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.closed.store(true, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn copies_every_byte() {
        let data: Vec<u8> = (0..5 * MIB + 123).map(|i| (i % 251) as u8).collect();
        let mut dst = Vec::new();
        let (sink, reporter) = reporter();
        let engine = CopyEngine::new(CopyConfig {
            chunk_size: 64 * 1024,
            report_every: 100_000,
        });

        let summary = engine
            .copy(data.as_slice(), &mut dst, "conserve", &reporter)
            .await
            .unwrap();
        reporter.close().await;

        let k = data.len() as u64;
        assert_eq!(dst, data);
        assert_eq!(summary.total_bytes, k);
        assert_eq!(summary.reported_bytes + summary.unreported_bytes(), k);
        assert!(summary.unreported_bytes() < 100_000 + 64 * 1024);
        assert_eq!(sink.lines.lock().unwrap().len(), summary.reports as usize);
    }

    #[tokio::test]
    async fn empty_source_reports_nothing() {
        let mut dst = Vec::new();
        let (sink, reporter) = reporter();
        let summary = CopyEngine::default()
            .copy(&b""[..], &mut dst, "empty", &reporter)
            .await
            .unwrap();
        reporter.close().await;

        assert_eq!(summary.total_bytes, 0);
        assert_eq!(summary.reports, 0);
        assert!(dst.is_empty());
        assert!(sink.lines.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn same_instant_crossings_skip_rate() {
        let data = vec![7u8; 3 * MIB as usize];
        let (sink, reporter) = reporter();
        let engine = CopyEngine::new(CopyConfig {
            chunk_size: MIB as usize,
            report_every: MIB,
        });

        let summary = engine
            .copy(data.as_slice(), tokio::io::sink(), "fast", &reporter)
            .await
            .unwrap();
        reporter.close().await;

        assert_eq!(summary.reports, 3);
        assert_eq!(
            *sink.lines.lock().unwrap(),
            vec!["xfer fast: 1 MB", "xfer fast: 2 MB", "xfer fast: 3 MB"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn paced_source_reports_rate() {
        let (mut tx, rx) = tokio::io::duplex(2 * MIB as usize);
        let producer = tokio::spawn(async move {
            let block = vec![1u8; MIB as usize];
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(500)).await;
                tx.write_all(&block).await.unwrap();
            }
        });

        let (sink, reporter) = reporter();
        let engine = CopyEngine::new(CopyConfig {
            chunk_size: 64 * 1024,
            report_every: MIB,
        });
        let summary = engine
            .copy(rx, tokio::io::sink(), "paced", &reporter)
            .await
            .unwrap();
        producer.await.unwrap();
        reporter.close().await;

        assert_eq!(summary.total_bytes, 3 * MIB);
        assert_eq!(
            *sink.lines.lock().unwrap(),
            vec![
                "xfer paced: 1 MB (2 MB/s)",
                "xfer paced: 2 MB (2 MB/s)",
                "xfer paced: 3 MB (2 MB/s)",
            ]
        );
    }

    #[tokio::test]
    async fn read_failure_aborts_and_closes() {
        let closed = Arc::new(AtomicBool::new(false));
        let dst = TrackingWriter {
            fail_writes: false,
            closed: closed.clone(),
        };
        let (_sink, reporter) = reporter();

        let err = CopyEngine::default()
            .copy(FailingReader, dst, "gs://b/k", &reporter)
            .await
            .unwrap_err();

        match err {
            TransferError::Stream { label, source } => {
                assert_eq!(label, "gs://b/k");
                assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn write_failure_aborts_and_closes() {
        let closed = Arc::new(AtomicBool::new(false));
        let dst = TrackingWriter {
            fail_writes: true,
            closed: closed.clone(),
        };
        let (_sink, reporter) = reporter();

        let err = CopyEngine::default()
            .copy(&b"payload"[..], dst, "/out/a", &reporter)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Stream { ref label, .. } if label == "/out/a"));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn zero_config_uses_defaults() {
        let engine = CopyEngine::new(CopyConfig {
            chunk_size: 0,
            report_every: 0,
        });
        assert_eq!(engine.config(), CopyConfig::default());
    }
}
