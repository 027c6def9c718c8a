//! Reopens placed objects straight from their records.

use super::error::{StoreError, StoreResult};
use crate::{
    models::record::StorageRecord,
    storage::{
        BackendError, FileLocation, ObjectReader, ShareHandle, SharedBackend,
        validate_relative_path, validate_segment,
    },
};
use tracing::debug;

/// Handle to a placed object. Creating one performs no I/O.
#[derive(Clone)]
pub struct ObjectHandle {
    backend: SharedBackend,
    location: FileLocation,
}

impl ObjectHandle {
    pub fn location(&self) -> &FileLocation {
        &self.location
    }

    pub async fn exists(&self) -> StoreResult<bool> {
        Ok(self.backend.file_exists(&self.location).await?)
    }

    /// Open the object for reading, `NotFound` if it is gone.
    pub async fn open(&self) -> StoreResult<ObjectReader> {
        if !self.exists().await? {
            return Err(StoreError::NotFound(self.location.to_string()));
        }
        Ok(self.backend.open_file(&self.location).await?)
    }
}

#[derive(Clone)]
pub struct RetrievalService {
    backend: SharedBackend,
}

impl RetrievalService {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Build a handle for the object a record points at.
    ///
    /// Does not check existence; the caller does that before use.
    pub fn resolve(&self, record: &StorageRecord) -> StoreResult<ObjectHandle> {
        let location = location_of(record)?;
        Ok(ObjectHandle {
            backend: self.backend.clone(),
            location,
        })
    }

    /// Delete the object behind `record`.
    ///
    /// Returns `false` without error when it was already gone. Only the
    /// object is touched; removing the record afterwards is up to the caller.
    pub async fn delete(&self, record: &StorageRecord) -> StoreResult<bool> {
        let location = location_of(record)?;
        let deleted = self.backend.delete_file_if_exists(&location).await?;
        debug!(file = %location, deleted, "deleted object");
        Ok(deleted)
    }
}

fn location_of(record: &StorageRecord) -> StoreResult<FileLocation> {
    let invalid = |err: BackendError| {
        StoreError::invalid(format!("record {} is malformed: {}", record.id, err))
    };
    validate_segment(&record.share_name).map_err(invalid)?;
    validate_relative_path(&record.directory_path).map_err(invalid)?;
    validate_segment(&record.file_name).map_err(invalid)?;
    Ok(ShareHandle::new(record.share_name.as_str())
        .directory(record.directory_path.as_str())
        .file(record.file_name.as_str()))
}
