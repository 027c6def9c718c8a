//! Decides whether a share can take another write.

use super::error::{StoreError, StoreResult};
use crate::storage::{BackendError, ShareHandle, SharedBackend};
use tracing::debug;

/// Default usage ceiling, one unit below a 5000-unit share quota.
pub const DEFAULT_USAGE_CEILING: u64 = 4999;

#[derive(Clone)]
pub struct ShareCapacityProbe {
    backend: SharedBackend,
    usage_ceiling: u64,
}

impl ShareCapacityProbe {
    pub fn new(backend: SharedBackend, usage_ceiling: u64) -> Self {
        Self {
            backend,
            usage_ceiling,
        }
    }

    /// Report whether `share` is writable, creating it when absent.
    ///
    /// An existing share is usable while its usage stays strictly below the
    /// ceiling. A freshly created share is always usable.
    pub async fn ensure_usable(&self, share: &ShareHandle) -> StoreResult<bool> {
        if !self.backend.share_exists(share).await.map_err(unavailable)? {
            let created = self
                .backend
                .create_share_if_absent(share)
                .await
                .map_err(unavailable)?;
            debug!(share = %share.name, created, "share was absent");
            return Ok(true);
        }

        let stats = self.backend.share_stats(share).await.map_err(unavailable)?;
        let usable = stats.usage < self.usage_ceiling;
        debug!(
            share = %share.name,
            usage = stats.usage,
            ceiling = self.usage_ceiling,
            usable,
            "probed share"
        );
        Ok(usable)
    }
}

/// Any failure reaching the account-level API means the backend is unavailable.
fn unavailable(err: BackendError) -> StoreError {
    StoreError::StorageUnavailable(err.to_string())
}
