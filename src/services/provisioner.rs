//! Ensures a nested directory chain exists inside a share.

use super::error::{StoreError, StoreResult};
use crate::storage::{BackendError, DirectoryHandle, SharedBackend};
use tracing::debug;

#[derive(Clone)]
pub struct DirectoryProvisioner {
    backend: SharedBackend,
}

impl DirectoryProvisioner {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Make sure `directory` and all of its ancestors exist.
    ///
    /// Walks up from the leaf until an existing ancestor (or the share root)
    /// is found, then creates the missing directories parent-first. When the
    /// leaf already exists this costs a single existence check. Directories
    /// created by a concurrent caller in between count as success; anything
    /// created before a failure is left in place.
    pub async fn ensure_directory(&self, directory: &DirectoryHandle) -> StoreResult<()> {
        let mut missing = Vec::new();
        let mut current = Some(directory.clone());
        while let Some(dir) = current {
            if dir.is_root() || self.exists(&dir).await? {
                break;
            }
            current = dir.parent();
            missing.push(dir);
        }

        for dir in missing.into_iter().rev() {
            match self.backend.create_directory(&dir).await {
                Ok(()) => debug!(directory = %dir, "created directory"),
                Err(BackendError::AlreadyExists(_)) => {
                    debug!(directory = %dir, "directory created concurrently")
                }
                Err(err) => return Err(provisioning_error(&dir, err)),
            }
        }
        Ok(())
    }

    async fn exists(&self, dir: &DirectoryHandle) -> StoreResult<bool> {
        self.backend
            .directory_exists(dir)
            .await
            .map_err(|err| provisioning_error(dir, err))
    }
}

fn provisioning_error(dir: &DirectoryHandle, err: BackendError) -> StoreError {
    match err {
        BackendError::Unavailable(msg) => StoreError::StorageUnavailable(msg),
        BackendError::Io(err) => StoreError::StorageUnavailable(err.to_string()),
        other => StoreError::ProvisioningFailed {
            path: dir.to_string(),
            reason: other.to_string(),
        },
    }
}
