//! Storage backend capability.
//!
//! Addresses objects as `share -> directory -> file`. The placement engine
//! only ever talks to [`ShareBackend`]; which medium sits underneath
//! (local disk, an in-memory fake for tests) is a deployment detail.

pub mod local;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::{fmt, io, pin::Pin, sync::Arc};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Upload body handed to the backend.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Readable object content.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("`{0}` already exists")]
    AlreadyExists(String),
    #[error("`{0}` not found")]
    NotFound(String),
    #[error("invalid storage path `{0}`")]
    InvalidPath(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Usage statistics of a share, in the backend's capacity units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShareStats {
    pub usage: u64,
}

/// What a completed write produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    pub bytes_written: u64,
    pub content_md5: Option<String>,
}

/// A share selected for writing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShareHandle {
    pub name: String,
}

impl ShareHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Root directory of the share.
    pub fn root(&self) -> DirectoryHandle {
        DirectoryHandle {
            share: self.clone(),
            path: String::new(),
        }
    }

    pub fn directory(&self, path: impl Into<String>) -> DirectoryHandle {
        DirectoryHandle {
            share: self.clone(),
            path: path.into(),
        }
    }
}

/// A directory inside a share. An empty `path` is the share root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DirectoryHandle {
    pub share: ShareHandle,
    pub path: String,
}

impl DirectoryHandle {
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Parent directory, or `None` at the share root.
    pub fn parent(&self) -> Option<DirectoryHandle> {
        if self.is_root() {
            return None;
        }
        Some(match self.path.rfind('/') {
            Some(pos) => self.share.directory(&self.path[..pos]),
            None => self.share.root(),
        })
    }

    pub fn file(&self, name: impl Into<String>) -> FileLocation {
        FileLocation {
            directory: self.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DirectoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "{}/", self.share.name)
        } else {
            write!(f, "{}/{}", self.share.name, self.path)
        }
    }
}

/// Fully qualified location of a file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileLocation {
    pub directory: DirectoryHandle,
    pub name: String,
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.directory.is_root() {
            write!(f, "{}/{}", self.directory.share.name, self.name)
        } else {
            write!(f, "{}/{}", self.directory, self.name)
        }
    }
}

/// Hierarchical object storage with capacity-bounded shares.
///
/// Implementations must be safe to call concurrently. Share and directory
/// creation are idempotent; `write_file` must never overwrite an existing
/// file and reports [`BackendError::AlreadyExists`] instead.
#[async_trait]
pub trait ShareBackend: Send + Sync + 'static {
    async fn share_exists(&self, share: &ShareHandle) -> BackendResult<bool>;

    /// Create the share. Returns `false` when it already existed.
    async fn create_share_if_absent(&self, share: &ShareHandle) -> BackendResult<bool>;

    async fn share_stats(&self, share: &ShareHandle) -> BackendResult<ShareStats>;

    async fn directory_exists(&self, directory: &DirectoryHandle) -> BackendResult<bool>;

    /// Create a single directory whose parent already exists.
    ///
    /// Fails with [`BackendError::AlreadyExists`] if it is already present.
    async fn create_directory(&self, directory: &DirectoryHandle) -> BackendResult<()>;

    async fn file_exists(&self, file: &FileLocation) -> BackendResult<bool>;

    async fn write_file(&self, file: &FileLocation, content: ByteStream)
    -> BackendResult<WriteOutcome>;

    async fn open_file(&self, file: &FileLocation) -> BackendResult<ObjectReader>;

    /// Returns `true` if the file existed and was removed.
    async fn delete_file_if_exists(&self, file: &FileLocation) -> BackendResult<bool>;

    /// Cheap round-trip used by readiness checks.
    async fn health_check(&self) -> BackendResult<()>;
}

pub type SharedBackend = Arc<dyn ShareBackend>;

/// Reject paths that could escape their share or address nothing.
pub fn validate_relative_path(path: &str) -> BackendResult<()> {
    if path.is_empty() {
        return Ok(());
    }
    if path.starts_with('/') || path.ends_with('/') || path.contains('\\') {
        return Err(BackendError::InvalidPath(path.to_string()));
    }
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(BackendError::InvalidPath(path.to_string()));
        }
        if segment.bytes().any(|b| b.is_ascii_control()) {
            return Err(BackendError::InvalidPath(path.to_string()));
        }
    }
    Ok(())
}

/// A file or share name must be a single, non-trivial path segment.
pub fn validate_segment(name: &str) -> BackendResult<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(BackendError::InvalidPath(name.to_string()));
    }
    validate_relative_path(name)
}
