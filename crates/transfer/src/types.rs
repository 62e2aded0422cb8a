//! Backend seams.
//!
//! Each backend hands out plain async byte streams; the copy engine never
//! knows which storage it is talking to.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use url::Url;

use crate::TransferError;

/// Readable end of a copy.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Writable end of a copy. The copy is only complete once it was shut down.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Boxed future returned by backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransferError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// Metadata for one distributed filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    /// Path as addressed by callers.
    pub path: String,
    /// Canonical identity. Two entries with the same id are the same
    /// object even when reached through different paths.
    pub id: String,
    pub kind: FileKind,
    /// Length in bytes; 0 for directories.
    pub len: u64,
}

impl FileStatus {
    /// Last path component.
    pub fn name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// Bucket storage addressed by `gs://bucket/key` URIs.
pub trait ObjectStore: Send + Sync {
    fn open_read<'a>(&'a self, uri: &'a str) -> BackendFuture<'a, BoxedReader>;

    /// Opens `uri` for writing, replacing any existing object.
    fn open_write<'a>(&'a self, uri: &'a str) -> BackendFuture<'a, BoxedWriter>;
}

/// Hierarchical filesystem with directories.
pub trait DistributedFs: Send + Sync {
    /// Returns [`TransferError::NotFound`] when nothing exists at `path`.
    fn stat<'a>(&'a self, path: &'a str) -> BackendFuture<'a, FileStatus>;

    /// Lists the direct children of a directory.
    fn list<'a>(&'a self, path: &'a str) -> BackendFuture<'a, Vec<FileStatus>>;

    fn open<'a>(&'a self, path: &'a str) -> BackendFuture<'a, BoxedReader>;

    /// Creates or overwrites the file at `path`, making parents as needed.
    fn create<'a>(&'a self, path: &'a str) -> BackendFuture<'a, BoxedWriter>;
}

/// Read-only HTTP(S) source.
pub trait WebSource: Send + Sync {
    fn get<'a>(&'a self, url: &'a Url) -> BackendFuture<'a, BoxedReader>;
}
