//! Distributed filesystem over the WebHDFS REST API.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use futures_util::TryStreamExt;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::header::LOCATION;
use serde::Deserialize;
use tokio::io::{AsyncWrite, DuplexStream};
use tokio::task::JoinHandle;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::debug;
use url::Url;

use clusterlink_transfer::{
    BackendFuture, BoxedReader, BoxedWriter, DistributedFs, FileKind, FileStatus, TransferError,
};

use crate::{StorageError, status_error};

/// Characters escaped inside a WebHDFS path; `/` is kept.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Buffer between the copy engine and the streamed upload body.
const UPLOAD_PIPE: usize = 256 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatus {
    #[serde(default)]
    path_suffix: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    length: u64,
    #[serde(default)]
    file_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(rename = "FileStatus")]
    file_status: RawStatus,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(rename = "FileStatuses")]
    file_statuses: ListInner,
}

#[derive(Debug, Deserialize)]
struct ListInner {
    #[serde(rename = "FileStatus", default)]
    file_status: Vec<RawStatus>,
}

impl RawStatus {
    fn into_status(self, path: String) -> FileStatus {
        let kind = if self.kind == "DIRECTORY" {
            FileKind::Directory
        } else {
            FileKind::File
        };
        let id = match self.file_id {
            Some(id) => id.to_string(),
            None => path.clone(),
        };
        FileStatus {
            path,
            id,
            kind,
            len: self.length,
        }
    }
}

/// [`DistributedFs`] talking to a namenode's WebHDFS endpoint.
pub struct WebHdfs {
    /// Follows redirects (OPEN is answered with a datanode redirect).
    http: reqwest::Client,
    /// Leaves redirects alone so CREATE can read the datanode location.
    http_no_redirect: reqwest::Client,
    /// Datanode uploads; nothing is read until the body is sent, so no
    /// read timeout.
    http_upload: reqwest::Client,
    base_url: String,
    user: Option<String>,
    timeout: Duration,
}

impl WebHdfs {
    /// Creates a client for `base_url` (e.g. `http://namenode:50070`).
    ///
    /// `timeout` bounds connects and metadata requests. A file being read
    /// fails once the datanode sends nothing for `timeout`.
    pub fn new(
        base_url: impl Into<String>,
        user: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let base_url = base_url.into();
        Url::parse(&base_url)?;

        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        let http_no_redirect = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let http_upload = reqwest::Client::builder().connect_timeout(timeout).build()?;

        Ok(Self {
            http,
            http_no_redirect,
            http_upload,
            base_url: base_url.trim_end_matches('/').to_string(),
            user,
            timeout,
        })
    }

    /// Resolves `path` to an absolute filesystem path.
    ///
    /// Relative paths live under the user's home directory.
    fn absolute(&self, path: &str) -> Result<String, TransferError> {
        clusterlink_transfer::validate_fs_path(path)?;
        if path.starts_with('/') {
            return Ok(path.to_string());
        }
        match &self.user {
            Some(user) => Ok(format!("/user/{user}/{}", path.trim_start_matches("./"))),
            None => Err(TransferError::InvalidPath(format!(
                "relative path without a user: {path}"
            ))),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/webhdfs/v1{}",
            self.base_url,
            utf8_percent_encode(path, PATH)
        )
    }

    fn params<'p>(&'p self, op: &'p str) -> Vec<(&'p str, &'p str)> {
        let mut params = vec![("op", op)];
        if let Some(user) = &self.user {
            params.push(("user.name", user.as_str()));
        }
        params
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        op: &'static str,
    ) -> Result<T, StorageError> {
        let resp = self
            .http
            .get(self.endpoint(path))
            .query(&self.params(op))
            .timeout(self.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(status_error(op, resp).await);
        }
        Ok(serde_json::from_slice(&resp.bytes().await?)?)
    }

    async fn create_location(&self, path: &str) -> Result<String, StorageError> {
        let mut params = self.params("CREATE");
        params.push(("overwrite", "true"));
        let resp = self
            .http_no_redirect
            .put(self.endpoint(path))
            .query(&params)
            .timeout(self.timeout)
            .send()
            .await?;

        if resp.status() != StatusCode::TEMPORARY_REDIRECT {
            return Err(status_error("CREATE", resp).await);
        }
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(StorageError::MissingRedirect("CREATE"))?;
        // Datanode locations are usually absolute; resolve relative ones
        // against the namenode.
        Ok(Url::parse(&self.base_url)?.join(location)?.to_string())
    }
}

impl DistributedFs for WebHdfs {
    fn stat<'a>(&'a self, path: &'a str) -> BackendFuture<'a, FileStatus> {
        Box::pin(async move {
            let abs = self.absolute(path)?;
            let resp: StatusResponse = self
                .get_json(&abs, "GETFILESTATUS")
                .await
                .map_err(|e| e.at(path))?;
            Ok(resp.file_status.into_status(path.to_string()))
        })
    }

    fn list<'a>(&'a self, path: &'a str) -> BackendFuture<'a, Vec<FileStatus>> {
        Box::pin(async move {
            let abs = self.absolute(path)?;
            let resp: ListResponse = self
                .get_json(&abs, "LISTSTATUS")
                .await
                .map_err(|e| e.at(path))?;
            let base = path.trim_end_matches('/');
            Ok(resp
                .file_statuses
                .file_status
                .into_iter()
                .map(|raw| {
                    let child = format!("{base}/{}", raw.path_suffix);
                    raw.into_status(child)
                })
                .collect())
        })
    }

    fn open<'a>(&'a self, path: &'a str) -> BackendFuture<'a, BoxedReader> {
        Box::pin(async move {
            let abs = self.absolute(path)?;
            let resp = self
                .http
                .get(self.endpoint(&abs))
                .query(&self.params("OPEN"))
                .send()
                .await
                .map_err(|e| StorageError::from(e).at(path))?;
            if !resp.status().is_success() {
                return Err(status_error("OPEN", resp).await.at(path));
            }
            debug!(%path, "reading file");

            let stream = resp.bytes_stream().map_err(io::Error::other);
            Ok(Box::new(StreamReader::new(Box::pin(stream))) as BoxedReader)
        })
    }

    fn create<'a>(&'a self, path: &'a str) -> BackendFuture<'a, BoxedWriter> {
        Box::pin(async move {
            let abs = self.absolute(path)?;
            let location = self.create_location(&abs).await.map_err(|e| e.at(path))?;
            debug!(%path, %location, "writing file");

            let (pipe, body) = tokio::io::duplex(UPLOAD_PIPE);
            let http = self.http_upload.clone();
            let upload = tokio::spawn(async move {
                let body = reqwest::Body::wrap_stream(ReaderStream::new(body));
                let resp = http.put(&location).body(body).send().await?;
                if !resp.status().is_success() {
                    return Err(status_error("CREATE", resp).await);
                }
                Ok(())
            });

            Ok(Box::new(UploadWriter {
                pipe: Some(pipe),
                upload: Some(upload),
                path: path.to_string(),
            }) as BoxedWriter)
        })
    }
}

/// Feeds a streamed PUT running on a background task.
///
/// Shutting down closes the body and waits for the datanode's answer.
struct UploadWriter {
    pipe: Option<DuplexStream>,
    upload: Option<JoinHandle<Result<(), StorageError>>>,
    path: String,
}

impl UploadWriter {
    fn poll_upload(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let Some(upload) = self.upload.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let result = ready!(Pin::new(upload).poll(cx));
        self.upload = None;
        Poll::Ready(match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(io::Error::other(format!("{}: {e}", self.path))),
            Err(join) => Err(io::Error::other(join)),
        })
    }
}

impl AsyncWrite for UploadWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let Some(pipe) = this.pipe.as_mut() else {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "upload already closed",
            )));
        };
        match ready!(Pin::new(pipe).poll_write(cx, buf)) {
            Ok(n) => Poll::Ready(Ok(n)),
            // The body reader is gone, so the request already ended; report why.
            Err(e) if this.upload.as_ref().is_some_and(|u| u.is_finished()) => {
                match this.poll_upload(cx) {
                    Poll::Ready(Err(upload_err)) => Poll::Ready(Err(upload_err)),
                    _ => Poll::Ready(Err(e)),
                }
            }
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().pipe.as_mut() {
            Some(pipe) => Pin::new(pipe).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(pipe) = this.pipe.as_mut() {
            ready!(Pin::new(pipe).poll_shutdown(cx))?;
            this.pipe = None;
        }
        this.poll_upload(cx)
    }
}

impl Drop for UploadWriter {
    fn drop(&mut self) {
        // Never shut down: do not let a truncated body complete the file.
        if self.pipe.is_some() {
            if let Some(upload) = &self.upload {
                upload.abort();
            }
        }
    }
}
