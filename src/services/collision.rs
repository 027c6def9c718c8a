//! Picks the first free `{base}_{n}{ext}` name inside a directory.

use super::error::{StoreError, StoreResult};
use crate::storage::{DirectoryHandle, SharedBackend};
use tracing::debug;

#[derive(Clone)]
pub struct CollisionResolver {
    backend: SharedBackend,
}

impl CollisionResolver {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    pub fn candidate(base_name: &str, suffix: u64, extension: &str) -> String {
        format!("{}_{}{}", base_name, suffix, extension)
    }

    /// Probe `_0`, `_1`, ... until a name is free in `directory`.
    ///
    /// The answer is only a hint: a concurrent placement may claim the same
    /// name before the write, which the write itself detects.
    pub async fn resolve_name(
        &self,
        directory: &DirectoryHandle,
        base_name: &str,
        extension: &str,
    ) -> StoreResult<String> {
        let mut suffix = 0u64;
        loop {
            let name = Self::candidate(base_name, suffix, extension);
            let file = directory.file(name.as_str());
            let taken = self
                .backend
                .file_exists(&file)
                .await
                .map_err(|err| StoreError::from_placement(&file.to_string(), err))?;
            if !taken {
                if suffix > 0 {
                    debug!(directory = %directory, %name, collisions = suffix, "resolved name");
                }
                return Ok(name);
            }
            suffix += 1;
        }
    }
}
