//! HTTPS client for the coordinator.
//!
//! The coordinator serves a self-signed certificate, so certificate
//! validation is turned off on purpose.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use clusterlink_protocol::constants::{CLUSTER_STATUS_PATH, OP_STATUS_PATH, coordinator_url};
use clusterlink_protocol::{ClusterStatusForm, OpStatusForm};

use crate::SendError;
use crate::sink::{ProgressSink, SinkFuture};

/// Upper bound for establishing a connection, whatever the request timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts URL-encoded status forms to the coordinator.
pub struct CoordinatorClient {
    http: reqwest::Client,
    base_url: String,
}

impl CoordinatorClient {
    /// Creates a client for `https://{host}:{port}` with a per-request timeout.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, SendError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: coordinator_url(host, port),
        })
    }

    /// Overrides the base URL (plain HTTP mock servers in tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, form: &T) -> Result<(), SendError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.post(&url).form(form).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(%url, "status update delivered");
        Ok(())
    }

    /// Sends one status line for a transfer operation.
    pub async fn send_op_status(&self, operation: &str, state: &str) -> Result<(), SendError> {
        self.post(OP_STATUS_PATH, &OpStatusForm::new(operation, state))
            .await
    }

    /// Sends an already serialized cluster snapshot.
    pub async fn send_cluster_json(&self, data: &str) -> Result<(), SendError> {
        self.post(CLUSTER_STATUS_PATH, &ClusterStatusForm::new(data))
            .await
    }
}

/// Sink posting each message as the `state` of one operation.
pub struct OpStatusSink {
    client: Arc<CoordinatorClient>,
    operation: String,
}

impl OpStatusSink {
    pub fn new(client: Arc<CoordinatorClient>, operation: impl Into<String>) -> Self {
        Self {
            client,
            operation: operation.into(),
        }
    }
}

impl ProgressSink for OpStatusSink {
    fn report<'a>(&'a self, message: &'a str) -> SinkFuture<'a> {
        Box::pin(self.client.send_op_status(&self.operation, message))
    }
}

/// Sink posting each message as the `data` field of a cluster update.
///
/// Messages must already be serialized snapshots.
pub struct ClusterStatusSink {
    client: Arc<CoordinatorClient>,
}

impl ClusterStatusSink {
    pub fn new(client: Arc<CoordinatorClient>) -> Self {
        Self { client }
    }
}

impl ProgressSink for ClusterStatusSink {
    fn report<'a>(&'a self, message: &'a str) -> SinkFuture<'a> {
        Box::pin(self.client.send_cluster_json(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use clusterlink_protocol::{ClusterSnapshot, JobRunState, JobState};

    /// Reads one full HTTP request (headers and body) from the stream.
    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Starts a mock coordinator that answers one request with `status` and
    /// hands the raw request back through the returned channel.
    async fn mock_coordinator(status: u16) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let request = read_request(&mut stream).await;
                let body = "\n";
                let resp = format!(
                    "HTTP/1.1 {status} Status\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
                let _ = tx.send(request);
            }
        });

        (url, rx)
    }

    fn client(url: String) -> Arc<CoordinatorClient> {
        Arc::new(
            CoordinatorClient::new("coordinator", 8888, Duration::from_secs(5))
                .unwrap()
                .with_base_url(url),
        )
    }

    #[test]
    fn default_base_url() {
        let c = CoordinatorClient::new("coordinator", 8888, Duration::from_secs(5)).unwrap();
        assert_eq!(c.base_url(), "https://coordinator:8888");
    }

    #[tokio::test]
    async fn op_status_posts_form() {
        let (url, rx) = mock_coordinator(200).await;
        let sink = OpStatusSink::new(client(url), "op-42");

        sink.report("Done").await.unwrap();

        let request = rx.await.unwrap();
        assert!(request.starts_with("POST /instance/op_status "));
        assert!(request.contains("application/x-www-form-urlencoded"));
        assert!(request.contains("state=Done"));
        assert!(request.contains("operation=op-42"));
    }

    #[tokio::test]
    async fn op_status_encodes_message() {
        let (url, rx) = mock_coordinator(200).await;
        let sink = OpStatusSink::new(client(url), "op-1");

        sink.report("xfer a: 100 MB (5 MB/s)").await.unwrap();

        let request = rx.await.unwrap();
        assert!(request.contains("state=xfer+a%3A+100+MB+%285+MB%2Fs%29"));
    }

    #[tokio::test]
    async fn cluster_status_posts_data_field() {
        let (url, rx) = mock_coordinator(200).await;
        let c = client(url);

        let snapshot = ClusterSnapshot {
            jobs: vec![JobState {
                id: "job_1".into(),
                status: JobRunState::Running,
                failure_info: None,
                map_progress: 1.0,
                reduce_progress: 0.0,
                elapsed_seconds: 3,
            }],
            mapreduce_nodes: 2,
            map_tasks: 0,
            reduce_tasks: 1,
        };
        c.send_cluster_json(&snapshot.to_json().unwrap()).await.unwrap();

        let request = rx.await.unwrap();
        assert!(request.starts_with("POST /hadoop/status_update "));
        assert!(request.contains("data=%7B%22jobs%22"));
        assert!(!request.contains("operation="));
    }

    #[tokio::test]
    async fn rejected_status_is_an_error() {
        let (url, _rx) = mock_coordinator(401).await;
        let sink = ClusterStatusSink::new(client(url));

        let err = sink.report("{}").await.unwrap_err();
        assert!(matches!(err, SendError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn unreachable_coordinator_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let sink = OpStatusSink::new(client(format!("http://127.0.0.1:{port}")), "op");
        let err = sink.report("Done").await.unwrap_err();
        assert!(matches!(err, SendError::Http(_)));
    }
}
