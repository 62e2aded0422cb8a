//! The sink trait and its local realization.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use crate::SendError;

/// A boxed future returned by [`ProgressSink::report`].
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SendError>> + Send + 'a>>;

/// Destination for status messages.
///
/// Implementations must be cheap to share; the reporter task holds one behind
/// an `Arc` for the lifetime of a transfer or the poller.
pub trait ProgressSink: Send + Sync {
    /// Delivers one message.
    fn report<'a>(&'a self, message: &'a str) -> SinkFuture<'a>;
}

impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    fn report<'a>(&'a self, message: &'a str) -> SinkFuture<'a> {
        (**self).report(message)
    }
}

/// Writes each message as one line on standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn report<'a>(&'a self, message: &'a str) -> SinkFuture<'a> {
        Box::pin(async move {
            let mut out = tokio::io::stdout();
            out.write_all(message.as_bytes()).await?;
            out.write_all(b"\n").await?;
            out.flush().await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stdout_sink_accepts_messages() {
        StdoutSink.report("xfer test: 0 MB").await.unwrap();
    }

    #[tokio::test]
    async fn arc_sink_forwards() {
        let sink: Arc<dyn ProgressSink> = Arc::new(StdoutSink);
        sink.report("forwarded").await.unwrap();
    }
}
