//! Represents a placed document: where its bytes live inside the share pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted metadata for one placed object.
///
/// The `(share_name, directory_path, file_name)` triple is enough to reopen
/// or delete the object without repeating share selection or provisioning.
/// All location fields are fixed once the record exists.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct StorageRecord {
    /// Row identifier assigned by the record store.
    pub id: i64,

    /// Share holding the object (e.g. "share01").
    pub share_name: String,

    /// Slash-delimited directory relative to the share root.
    pub directory_path: String,

    /// Final file name including collision suffix and extension.
    pub file_name: String,

    /// Instant the placement was captured.
    pub created_at: DateTime<Utc>,

    /// Byte length of the stored content.
    pub size_bytes: i64,

    /// Base64 MD5 of the content, when the backend computed one.
    pub content_md5: Option<String>,
}

/// A successful placement that has not been persisted yet.
///
/// Produced by the placement engine only after the write went through;
/// the record store turns it into a [`StorageRecord`] by assigning an id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewStorageRecord {
    pub share_name: String,
    pub directory_path: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: i64,
    pub content_md5: Option<String>,
}

impl NewStorageRecord {
    pub fn with_id(self, id: i64) -> StorageRecord {
        StorageRecord {
            id,
            share_name: self.share_name,
            directory_path: self.directory_path,
            file_name: self.file_name,
            created_at: self.created_at,
            size_bytes: self.size_bytes,
            content_md5: self.content_md5,
        }
    }
}
