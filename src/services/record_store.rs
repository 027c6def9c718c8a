//! Metadata persistence for placed documents.
//!
//! The engine never writes here itself; callers persist a record only once
//! the object write succeeded, and remove it only after the object is gone.

use super::error::StoreResult;
use crate::models::record::{NewStorageRecord, StorageRecord};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

/// Schema for the `documents` table.
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const RECORD_COLUMNS: &str =
    "id, share_name, directory_path, file_name, created_at, size_bytes, content_md5";

#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Persist a placement and return it with its assigned id.
    async fn insert(&self, record: NewStorageRecord) -> StoreResult<StorageRecord>;

    async fn get(&self, id: i64) -> StoreResult<Option<StorageRecord>>;

    /// Newest first.
    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<StorageRecord>>;

    /// Returns `true` if a row was removed.
    async fn delete(&self, id: i64) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct SqliteRecordStore {
    db: Arc<SqlitePool>,
}

impl SqliteRecordStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

/// Apply [`SCHEMA`] statement by statement. Safe to run repeatedly.
pub async fn apply_schema(db: &SqlitePool) -> StoreResult<()> {
    let statements = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: NewStorageRecord) -> StoreResult<StorageRecord> {
        let sql = format!(
            "INSERT INTO documents (share_name, directory_path, file_name, created_at, size_bytes, content_md5)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {}",
            RECORD_COLUMNS
        );
        let stored = sqlx::query_as::<_, StorageRecord>(&sql)
            .bind(&record.share_name)
            .bind(&record.directory_path)
            .bind(&record.file_name)
            .bind(record.created_at)
            .bind(record.size_bytes)
            .bind(&record.content_md5)
            .fetch_one(&*self.db)
            .await?;
        Ok(stored)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<StorageRecord>> {
        let sql = format!("SELECT {} FROM documents WHERE id = ?", RECORD_COLUMNS);
        Ok(sqlx::query_as::<_, StorageRecord>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?)
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<StorageRecord>> {
        let sql = format!(
            "SELECT {} FROM documents ORDER BY id DESC LIMIT ? OFFSET ?",
            RECORD_COLUMNS
        );
        Ok(sqlx::query_as::<_, StorageRecord>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&*self.db)
            .await?)
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}
