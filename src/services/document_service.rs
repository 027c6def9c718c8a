//! DocumentService - the upload / view / delete flows built on the engine.
//!
//! Ordering rules live here rather than in the engine:
//! - a record is inserted only after the object write succeeded;
//! - on delete the object goes first, then the record, so a crash in
//!   between leaves an orphaned record and never a live record silently
//!   pointing at nothing.

use super::{
    error::{StoreError, StoreResult},
    path_builder::stem_of,
    placement::{PlacementEngine, Upload},
    record_store::RecordStore,
    retrieval::RetrievalService,
};
use crate::{models::record::StorageRecord, storage::ObjectReader};
use bytes::Bytes;
use chrono::Utc;
use futures::{StreamExt, future, stream};
use std::{io, sync::Arc};
use tracing::{debug, info, warn};

pub struct OpenedDocument {
    pub record: StorageRecord,
    pub reader: ObjectReader,
}

#[derive(Debug)]
pub struct DeleteOutcome {
    pub record: StorageRecord,
    /// `false` when the object was already gone before this call.
    pub object_deleted: bool,
}

#[derive(Clone)]
pub struct DocumentService {
    engine: PlacementEngine,
    retrieval: RetrievalService,
    records: Arc<dyn RecordStore>,
    conflict_retries: u32,
}

impl DocumentService {
    pub fn new(
        engine: PlacementEngine,
        retrieval: RetrievalService,
        records: Arc<dyn RecordStore>,
        conflict_retries: u32,
    ) -> Self {
        Self {
            engine,
            retrieval,
            records,
            conflict_retries,
        }
    }

    /// Place `content` and persist its record.
    ///
    /// `base_name` falls back to the stem of `original_name`. Losing a name
    /// race to a concurrent upload is retried up to `conflict_retries` times;
    /// every other failure is returned as is.
    pub async fn upload(
        &self,
        category: &str,
        base_name: Option<&str>,
        original_name: &str,
        content: Bytes,
    ) -> StoreResult<StorageRecord> {
        let base_name = match base_name {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => stem_of(original_name),
        };
        let now = Utc::now();

        let mut attempt = 0;
        let placed = loop {
            let upload = Upload {
                original_name: original_name.to_string(),
                content: stream::once(future::ready(Ok::<_, io::Error>(content.clone())))
                    .boxed(),
                content_length: content.len() as u64,
            };
            match self.engine.place(category, &base_name, upload, now).await {
                Ok(placed) => break placed,
                Err(StoreError::NameConflict(target)) if attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(%target, attempt, "lost name race, retrying placement");
                }
                Err(err) => return Err(err),
            }
        };

        match self.records.insert(placed.clone()).await {
            Ok(record) => {
                info!(
                    id = record.id,
                    share = %record.share_name,
                    file = %record.file_name,
                    "stored document"
                );
                Ok(record)
            }
            Err(err) => {
                let orphan = placed.with_id(0);
                if let Err(cleanup) = self.retrieval.delete(&orphan).await {
                    warn!(
                        share = %orphan.share_name,
                        directory = %orphan.directory_path,
                        file = %orphan.file_name,
                        "failed to remove object after record insert failed: {}",
                        cleanup
                    );
                }
                Err(err)
            }
        }
    }

    pub async fn fetch(&self, id: i64) -> StoreResult<StorageRecord> {
        self.records
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("document {}", id)))
    }

    pub async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<StorageRecord>> {
        self.records.list(limit, offset).await
    }

    /// Open a document for streaming; `NotFound` when either the record
    /// or the object behind it is missing.
    pub async fn open(&self, id: i64) -> StoreResult<OpenedDocument> {
        let record = self.fetch(id).await?;
        let handle = self.retrieval.resolve(&record)?;
        let reader = handle.open().await?;
        debug!(id, file = %handle.location(), "opened document");
        Ok(OpenedDocument { record, reader })
    }

    /// Delete the object, then its record.
    pub async fn delete(&self, id: i64) -> StoreResult<DeleteOutcome> {
        let record = self.fetch(id).await?;
        let object_deleted = self.retrieval.delete(&record).await?;
        if !object_deleted {
            warn!(id, "object already missing, removing record only");
        }
        self.records.delete(id).await?;
        Ok(DeleteOutcome {
            record,
            object_deleted,
        })
    }
}
