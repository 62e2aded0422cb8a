use std::io;
use std::time::Duration;

use futures_util::TryStreamExt;
use tokio_util::io::StreamReader;
use tracing::debug;
use url::Url;

use clusterlink_transfer::{BackendFuture, BoxedReader, WebSource};

use crate::{StorageError, status_error};

/// [`WebSource`] downloading with a plain GET.
pub struct HttpSource {
    http: reqwest::Client,
}

impl HttpSource {
    /// Creates a source whose connects, and any read of a download, give
    /// up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

impl WebSource for HttpSource {
    fn get<'a>(&'a self, url: &'a Url) -> BackendFuture<'a, BoxedReader> {
        Box::pin(async move {
            let resp = self
                .http
                .get(url.clone())
                .send()
                .await
                .map_err(|e| StorageError::from(e).at(url.as_str()))?;
            if !resp.status().is_success() {
                return Err(status_error("GET", resp).await.at(url.as_str()));
            }
            debug!(%url, length = ?resp.content_length(), "downloading");

            let stream = resp.bytes_stream().map_err(io::Error::other);
            Ok(Box::new(StreamReader::new(Box::pin(stream))) as BoxedReader)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterlink_transfer::TransferError;
    use tokio::io::AsyncReadExt;

    use crate::testing::{Reply, serve, stall};

    #[tokio::test]
    async fn downloads_body() {
        let (base, mut requests) = serve(|_| Reply::bytes(200, b"remote data")).await;
        let url = Url::parse(&format!("{base}/files/input.txt")).unwrap();

        let source = HttpSource::new(Duration::from_secs(5)).unwrap();
        let mut reader = source.get(&url).await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, b"remote data");
        let req = requests.recv().await.unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.target, "/files/input.txt");
    }

    #[tokio::test]
    async fn stalled_body_times_out() {
        let base = stall(b"12345").await;
        let url = Url::parse(&format!("{base}/big.bin")).unwrap();
        let source = HttpSource::new(Duration::from_millis(200)).unwrap();

        let mut reader = source.get(&url).await.unwrap();
        let mut out = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), reader.read_to_end(&mut out))
            .await
            .expect("read should fail before the outer timeout");
        assert!(read.is_err());
        assert!(out.len() <= 5);
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let (base, _requests) = serve(|_| Reply::bytes(404, b"no such file")).await;
        let url = Url::parse(&format!("{base}/missing")).unwrap();

        let source = HttpSource::new(Duration::from_secs(5)).unwrap();
        let err = match source.get(&url).await {
            Ok(_) => panic!("expected 404"),
            Err(e) => e,
        };
        assert!(matches!(err, TransferError::NotFound(ref u) if u.ends_with("/missing")));
    }

    #[tokio::test]
    async fn server_error_is_backend_failure() {
        let (base, _requests) = serve(|_| Reply::bytes(503, b"busy")).await;
        let url = Url::parse(&format!("{base}/x")).unwrap();

        let source = HttpSource::new(Duration::from_secs(5)).unwrap();
        let err = match source.get(&url).await {
            Ok(_) => panic!("expected 503"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("503"), "{err}");
    }
}
