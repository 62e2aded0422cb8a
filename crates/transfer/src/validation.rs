use std::path::{Component, Path};

use crate::TransferError;

/// Validates a distributed filesystem path before it is mapped onto storage.
///
/// Rejects:
/// - Empty paths
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
///
/// Both absolute and relative paths are accepted; backends resolve them
/// against their own root.
pub fn validate_fs_path(fs_path: &str) -> Result<(), TransferError> {
    if fs_path.is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }

    for component in Path::new(fs_path).components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {fs_path}"
                )));
            }
            Component::Prefix(_) => {
                return Err(TransferError::InvalidPath(format!(
                    "path prefix not allowed: {fs_path}"
                )));
            }
            Component::RootDir | Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}
