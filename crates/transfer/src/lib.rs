//! Streaming copies between heterogeneous storage backends.
//!
//! [`CopyOrchestrator`] picks a direction from a [`TransferDescriptor`],
//! opens both ends through the backend traits in [`types`], and hands the
//! streams to [`CopyEngine`], which pumps bytes and reports throughput.

mod descriptor;
mod engine;
mod orchestrator;
mod progress;
pub mod types;
mod validation;

pub use descriptor::{Endpoint, InputError, OBJECT_STORE_PREFIX, TransferDescriptor, TransferDirection};
pub use engine::{CopyConfig, CopyEngine, CopySummary};
pub use orchestrator::{AnnounceFn, Backends, CopyOrchestrator, TransferReport};
pub use progress::{IntervalMeter, TransferProgress};
pub use types::{
    BackendFuture, BoxedReader, BoxedWriter, DistributedFs, FileKind, FileStatus, ObjectStore,
    WebSource,
};
pub use validation::validate_fs_path;

/// Default read size: 4 MiB.
///
/// Object storage and distributed filesystem blocks are far larger than a
/// page, so small reads only add syscalls.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Default reporting threshold: one progress line every 100 MiB.
pub const DEFAULT_REPORT_EVERY: u64 = 100 * MIB;

/// Bytes per mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer of {label} failed: {source}")]
    Stream {
        label: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{location}: {reason}")]
    Backend { location: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Input(#[from] InputError),
}

impl TransferError {
    /// Wraps a stream failure with the label of the copy it aborted.
    pub fn stream(label: &str, source: std::io::Error) -> Self {
        Self::Stream {
            label: label.to_string(),
            source,
        }
    }

    /// Builds a backend failure for `location`.
    pub fn backend(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Backend {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}
