//! Distributed filesystem exposed through a local mount (FUSE, NFS gateway)
//! or a plain directory.

use std::path::{Path, PathBuf};

use tokio::fs;

use clusterlink_transfer::{
    BackendFuture, BoxedReader, BoxedWriter, DistributedFs, FileKind, FileStatus, TransferError,
    validate_fs_path,
};

use crate::StorageError;

/// [`DistributedFs`] rooted at a local directory.
///
/// `/a/b` resolves to `<root>/a/b`. Entry ids are canonical paths, so a
/// symlink back to an ancestor is recognized as the same directory.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, TransferError> {
        validate_fs_path(path)?;
        Ok(self.root.join(path.trim_start_matches('/')))
    }

    async fn status(&self, path: &str, local: &Path) -> Result<FileStatus, StorageError> {
        let meta = fs::metadata(local).await?;
        let canonical = fs::canonicalize(local).await?;
        let kind = if meta.is_dir() {
            FileKind::Directory
        } else {
            FileKind::File
        };
        Ok(FileStatus {
            path: path.to_string(),
            id: canonical.to_string_lossy().into_owned(),
            kind,
            len: if meta.is_dir() { 0 } else { meta.len() },
        })
    }
}

impl DistributedFs for LocalFs {
    fn stat<'a>(&'a self, path: &'a str) -> BackendFuture<'a, FileStatus> {
        Box::pin(async move {
            let local = self.resolve(path)?;
            self.status(path, &local).await.map_err(|e| e.at(path))
        })
    }

    fn list<'a>(&'a self, path: &'a str) -> BackendFuture<'a, Vec<FileStatus>> {
        Box::pin(async move {
            let local = self.resolve(path)?;
            let mut entries = fs::read_dir(&local)
                .await
                .map_err(|e| StorageError::from(e).at(path))?;

            let base = path.trim_end_matches('/');
            let mut children = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::from(e).at(path))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child = format!("{base}/{name}");
                let status = self
                    .status(&child, &entry.path())
                    .await
                    .map_err(|e| e.at(&child))?;
                children.push(status);
            }
            children.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(children)
        })
    }

    fn open<'a>(&'a self, path: &'a str) -> BackendFuture<'a, BoxedReader> {
        Box::pin(async move {
            let local = self.resolve(path)?;
            let file = fs::File::open(&local)
                .await
                .map_err(|e| StorageError::from(e).at(path))?;
            Ok(Box::new(file) as BoxedReader)
        })
    }

    fn create<'a>(&'a self, path: &'a str) -> BackendFuture<'a, BoxedWriter> {
        Box::pin(async move {
            let local = self.resolve(path)?;
            if let Some(parent) = local.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::from(e).at(path))?;
            }
            let file = fs::File::create(&local)
                .await
                .map_err(|e| StorageError::from(e).at(path))?;
            Ok(Box::new(file) as BoxedWriter)
        })
    }
}
