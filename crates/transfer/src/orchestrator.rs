use std::collections::HashSet;
use std::sync::Arc;

use clusterlink_report::ProgressReporter;
use tracing::{debug, info, warn};
use url::Url;

use crate::descriptor::{TransferDescriptor, TransferDirection};
use crate::engine::{CopyConfig, CopyEngine};
use crate::types::{BackendFuture, DistributedFs, FileStatus, ObjectStore, WebSource};
use crate::validation::validate_fs_path;
use crate::TransferError;

/// Called with `(source, destination)` before every file copy.
pub type AnnounceFn = Box<dyn Fn(&str, &str) + Send + Sync>;

/// The storage backends a transfer can touch.
#[derive(Clone)]
pub struct Backends {
    pub object_store: Arc<dyn ObjectStore>,
    pub fs: Arc<dyn DistributedFs>,
    pub web: Arc<dyn WebSource>,
}

/// Totals of a finished transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub files: u64,
    pub bytes: u64,
}

/// Selects the transfer for a descriptor and drives the copies.
pub struct CopyOrchestrator {
    backends: Backends,
    engine: CopyEngine,
    announce: AnnounceFn,
}

impl CopyOrchestrator {
    /// Creates an orchestrator announcing each copy on stdout.
    pub fn new(backends: Backends, config: CopyConfig) -> Self {
        Self {
            backends,
            engine: CopyEngine::new(config),
            announce: Box::new(|src, dst| println!("{src} -> {dst}")),
        }
    }

    /// Replaces the per-file announcement.
    pub fn with_announce(mut self, announce: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.announce = Box::new(announce);
        self
    }

    /// Runs the transfer described by `descriptor`.
    ///
    /// Unsupported descriptor pairs fail with [`TransferError::Input`]
    /// before any backend is touched.
    pub async fn run(
        &self,
        descriptor: &TransferDescriptor,
        reporter: &ProgressReporter,
    ) -> Result<TransferReport, TransferError> {
        let direction = descriptor.direction()?;
        let mut report = TransferReport::default();

        match direction {
            TransferDirection::ObjectToFs { uri, path } => {
                validate_fs_path(path)?;
                self.object_to_fs(uri, path, reporter, &mut report).await?;
            }
            TransferDirection::FsToObject { path, uri } => {
                validate_fs_path(path)?;
                let root = self.backends.fs.stat(path).await?;
                let mut visited = HashSet::new();
                self.fs_to_object(root, uri.to_string(), reporter, &mut visited, &mut report)
                    .await?;
            }
            TransferDirection::WebToFs { url, path } => {
                validate_fs_path(path)?;
                self.web_to_fs(url, path, reporter, &mut report).await?;
            }
        }

        info!(files = report.files, bytes = report.bytes, "transfer complete");
        Ok(report)
    }

    /// Announces the next copy once the previous copy's lines are out.
    async fn announce(&self, src: &str, dst: &str, reporter: &ProgressReporter) {
        reporter.flush().await;
        (self.announce)(src, dst);
    }

    async fn object_to_fs(
        &self,
        uri: &str,
        path: &str,
        reporter: &ProgressReporter,
        report: &mut TransferReport,
    ) -> Result<(), TransferError> {
        self.announce(uri, path, reporter).await;
        let src = self.backends.object_store.open_read(uri).await?;
        let dst = self.backends.fs.create(path).await?;
        let summary = self.engine.copy(src, dst, uri, reporter).await?;
        report.files += 1;
        report.bytes += summary.total_bytes;
        Ok(())
    }

    async fn web_to_fs(
        &self,
        url: &Url,
        path: &str,
        reporter: &ProgressReporter,
        report: &mut TransferReport,
    ) -> Result<(), TransferError> {
        self.announce(url.as_str(), path, reporter).await;
        let src = self.backends.web.get(url).await?;
        let dst = self.backends.fs.create(path).await?;
        let summary = self.engine.copy(src, dst, url.as_str(), reporter).await?;
        report.files += 1;
        report.bytes += summary.total_bytes;
        Ok(())
    }

    /// Copies a file, or a directory recursively, to `uri`.
    ///
    /// Directories are tracked by [`FileStatus::id`]; one reached a second
    /// time is skipped.
    fn fs_to_object<'a>(
        &'a self,
        status: FileStatus,
        uri: String,
        reporter: &'a ProgressReporter,
        visited: &'a mut HashSet<String>,
        report: &'a mut TransferReport,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            if !status.is_dir() {
                self.announce(&status.path, &uri, reporter).await;
                let src = self.backends.fs.open(&status.path).await?;
                let dst = self.backends.object_store.open_write(&uri).await?;
                let summary = self.engine.copy(src, dst, &status.path, reporter).await?;
                report.files += 1;
                report.bytes += summary.total_bytes;
                return Ok(());
            }

            if !visited.insert(status.id.clone()) {
                warn!(path = %status.path, id = %status.id, "directory already visited, skipping");
                return Ok(());
            }

            let children = self.backends.fs.list(&status.path).await?;
            debug!(path = %status.path, children = children.len(), "descending");
            let base = uri.trim_end_matches('/');
            for child in children {
                let child_uri = format!("{base}/{}", child.name());
                self.fs_to_object(child, child_uri, reporter, &mut *visited, &mut *report)
                    .await?;
            }
            Ok(())
        })
    }
}
