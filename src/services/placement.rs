//! PlacementEngine - selects a share, provisions the dated directory,
//! resolves a free name and writes the upload there.
//!
//! Nothing here persists metadata. A [`NewStorageRecord`] is returned only
//! after the write succeeded; every earlier failure surfaces as an error
//! and leaves nothing for the caller to record.

use super::{
    collision::CollisionResolver,
    error::{StoreError, StoreResult},
    path_builder::{build_path, extension_of},
    provisioner::DirectoryProvisioner,
    share_probe::ShareCapacityProbe,
    share_selector::ShareSelector,
};
use crate::{
    models::record::NewStorageRecord,
    storage::{BackendError, ByteStream, SharedBackend},
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

/// Incoming content plus what the client told us about it.
pub struct Upload {
    /// Name the client uploaded under; only its extension is kept.
    pub original_name: String,
    pub content: ByteStream,
    pub content_length: u64,
}

#[derive(Clone, Debug)]
pub struct PlacementSettings {
    pub share_prefix: String,
    pub usage_ceiling: u64,
    pub share_cache_ttl: Option<Duration>,
}

#[derive(Clone)]
pub struct PlacementEngine {
    backend: SharedBackend,
    selector: ShareSelector,
    provisioner: DirectoryProvisioner,
    resolver: CollisionResolver,
}

impl PlacementEngine {
    pub fn new(backend: SharedBackend, settings: PlacementSettings) -> Self {
        let probe = ShareCapacityProbe::new(backend.clone(), settings.usage_ceiling);
        Self {
            selector: ShareSelector::new(probe, settings.share_prefix, settings.share_cache_ttl),
            provisioner: DirectoryProvisioner::new(backend.clone()),
            resolver: CollisionResolver::new(backend.clone()),
            backend,
        }
    }

    pub async fn place(
        &self,
        category: &str,
        base_name: &str,
        upload: Upload,
        now: DateTime<Utc>,
    ) -> StoreResult<NewStorageRecord> {
        if upload.content_length == 0 {
            return Err(StoreError::invalid("upload has no content"));
        }
        let planned = build_path(category, base_name, now)?;

        let share = self.selector.select_writable_share().await?;
        let directory = share.directory(planned.directory_path);
        self.provisioner.ensure_directory(&directory).await?;

        let extension = extension_of(&upload.original_name);
        let file_name = self
            .resolver
            .resolve_name(&directory, &planned.base_name, &extension)
            .await?;
        let target = directory.file(file_name);

        let outcome = match self.backend.write_file(&target, upload.content).await {
            Ok(outcome) => outcome,
            Err(err @ BackendError::AlreadyExists(_)) => {
                return Err(StoreError::from_placement(&target.to_string(), err));
            }
            Err(err) => {
                // The share may have filled up or gone away underneath us.
                self.selector.invalidate();
                return Err(StoreError::from_placement(&target.to_string(), err));
            }
        };

        if outcome.bytes_written == 0 {
            if let Err(err) = self.backend.delete_file_if_exists(&target).await {
                warn!(file = %target, "failed to remove empty upload: {}", err);
            }
            return Err(StoreError::invalid("upload stream was empty"));
        }
        if outcome.bytes_written != upload.content_length {
            warn!(
                file = %target,
                declared = upload.content_length,
                written = outcome.bytes_written,
                "upload length differs from declared length"
            );
        }

        info!(file = %target, size = upload.content_length, "placed upload");
        Ok(NewStorageRecord {
            share_name: target.directory.share.name,
            directory_path: target.directory.path,
            file_name: target.name,
            created_at: now,
            size_bytes: upload.content_length as i64,
            content_md5: outcome.content_md5,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ShareBackend, ShareHandle, memory::MemoryShareBackend};
    use bytes::Bytes;
    use chrono::TimeZone;
    use futures::{StreamExt, stream};
    use std::sync::Arc;

    fn engine(backend: &Arc<MemoryShareBackend>) -> PlacementEngine {
        PlacementEngine::new(
            backend.clone(),
            PlacementSettings {
                share_prefix: "share".into(),
                usage_ceiling: 4999,
                share_cache_ttl: None,
            },
        )
    }

    fn upload(name: &str, data: Vec<u8>) -> Upload {
        let len = data.len() as u64;
        Upload {
            original_name: name.into(),
            content: stream::iter(vec![Ok(Bytes::from(data))]).boxed(),
            content_length: len,
        }
    }

    fn march_15() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn places_first_upload_in_first_share() {
        let backend = Arc::new(MemoryShareBackend::new());
        let record = engine(&backend)
            .place("Pictures", "Dog", upload("dog.jpg", vec![7; 1024]), march_15())
            .await
            .unwrap();

        assert_eq!(record.share_name, "share01");
        assert_eq!(record.directory_path, "Pictures/2024/Mar/15");
        assert_eq!(record.file_name, "Dog_0.jpg");
        assert_eq!(record.size_bytes, 1024);
        assert_eq!(record.created_at, march_15());

        let stored = ShareHandle::new("share01")
            .directory("Pictures/2024/Mar/15")
            .file("Dog_0.jpg");
        assert_eq!(backend.file_content(&stored).unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn repeated_uploads_take_increasing_suffixes() {
        let backend = Arc::new(MemoryShareBackend::new());
        let engine = engine(&backend);

        for n in 0..4 {
            let record = engine
                .place("Pictures", "Dog", upload("dog.jpg", vec![1; 16]), march_15())
                .await
                .unwrap();
            assert_eq!(record.file_name, format!("Dog_{}.jpg", n));
            assert_eq!(record.share_name, "share01");
            assert_eq!(record.directory_path, "Pictures/2024/Mar/15");
        }
    }

    #[tokio::test]
    async fn full_share_moves_placement_to_next() {
        let backend = Arc::new(MemoryShareBackend::new());
        backend.seed_share("share01", 5000);

        let record = engine(&backend)
            .place("Pictures", "Dog", upload("dog.jpg", vec![1; 8]), march_15())
            .await
            .unwrap();
        assert_eq!(record.share_name, "share02");
        assert_eq!(backend.share_names(), vec!["share01", "share02"]);
    }

    #[tokio::test]
    async fn empty_content_is_rejected_without_io() {
        let backend = Arc::new(MemoryShareBackend::new());
        let err = engine(&backend)
            .place("Pictures", "Dog", upload("dog.jpg", Vec::new()), march_15())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert_eq!(backend.calls("share_exists"), 0);
        assert!(backend.share_names().is_empty());
    }

    #[tokio::test]
    async fn empty_stream_with_declared_length_leaves_no_file() {
        let backend = Arc::new(MemoryShareBackend::new());
        let lying = Upload {
            original_name: "dog.jpg".into(),
            content: stream::iter(Vec::<std::io::Result<Bytes>>::new()).boxed(),
            content_length: 10,
        };
        let err = engine(&backend)
            .place("Pictures", "Dog", lying, march_15())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidArgument(_)));
        let target = ShareHandle::new("share01")
            .directory("Pictures/2024/Mar/15")
            .file("Dog_0.jpg");
        assert!(!backend.file_exists(&target).await.unwrap());
    }

    #[tokio::test]
    async fn write_failure_returns_error() {
        let backend = Arc::new(MemoryShareBackend::new());
        backend.set_fail_writes(true);

        let err = engine(&backend)
            .place("Pictures", "Dog", upload("dog.jpg", vec![1; 8]), march_15())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn directory_vanishing_before_write_is_a_storage_failure() {
        let backend = Arc::new(MemoryShareBackend::new());
        backend.set_vanish_on_write(true);

        let err = engine(&backend)
            .place("Pictures", "Dog", upload("dog.jpg", vec![1; 8]), march_15())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn lost_write_race_is_a_name_conflict() {
        let backend = Arc::new(MemoryShareBackend::new());
        backend.inject_conflicts(1);

        let err = engine(&backend)
            .place("Pictures", "Dog", upload("dog.jpg", vec![1; 8]), march_15())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NameConflict(_)));

        let winner = ShareHandle::new("share01")
            .directory("Pictures/2024/Mar/15")
            .file("Dog_0.jpg");
        assert_eq!(
            backend.file_content(&winner).unwrap(),
            Bytes::from_static(b"winner")
        );
    }

    #[tokio::test]
    async fn invalid_names_fail_before_io() {
        let backend = Arc::new(MemoryShareBackend::new());
        let err = engine(&backend)
            .place("..", "Dog", upload("dog.jpg", vec![1; 8]), march_15())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert_eq!(backend.calls("share_exists"), 0);
    }
}
