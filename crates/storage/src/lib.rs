//! Concrete storage backends for `clusterlink-transfer`.
//!
//! - [`GsutilStore`]: object store driven through the `gsutil` command line
//! - [`WebHdfs`]: distributed filesystem over the WebHDFS REST API
//! - [`LocalFs`]: distributed filesystem exposed as a local mount
//! - [`HttpSource`]: plain HTTP(S) downloads

mod gsutil;
mod localfs;
mod web;
mod webhdfs;

pub use gsutil::GsutilStore;
pub use localfs::LocalFs;
pub use web::HttpSource;
pub use webhdfs::WebHdfs;

use clusterlink_transfer::TransferError;

/// Errors raised inside the backends before they are attributed to a location.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0} did not return a redirect location")]
    MissingRedirect(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Attributes the error to `location`.
    ///
    /// A 404 status and a missing local file become
    /// [`TransferError::NotFound`].
    pub fn at(self, location: &str) -> TransferError {
        match self {
            Self::Status { status: 404, .. } => TransferError::NotFound(location.to_string()),
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                TransferError::NotFound(location.to_string())
            }
            other => TransferError::backend(location, other),
        }
    }
}

/// Reads the body of a failed response into a [`StorageError::Status`].
pub(crate) async fn status_error(operation: &'static str, resp: reqwest::Response) -> StorageError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    StorageError::Status {
        operation,
        status,
        body,
    }
}
