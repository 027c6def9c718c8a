//! src/storage/local.rs
//!
//! LocalShareBackend - shares as directories beneath `base_path/{share}`.
//! Usage is the byte total of a share expressed in `unit_bytes` capacity
//! units (rounded up), which mirrors how hosted file shares report quota.

use super::{
    BackendError, BackendResult, ByteStream, DirectoryHandle, FileLocation, ObjectReader,
    ShareBackend, ShareHandle, ShareStats, WriteOutcome, validate_relative_path,
    validate_segment,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use futures::StreamExt;
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

const TMP_PREFIX: &str = ".tmp-";

#[derive(Clone, Debug)]
pub struct LocalShareBackend {
    /// Directory holding one sub-directory per share.
    base_path: PathBuf,

    /// Bytes per reported usage unit.
    unit_bytes: u64,
}

impl LocalShareBackend {
    pub fn new(base_path: impl Into<PathBuf>, unit_bytes: u64) -> Self {
        Self {
            base_path: base_path.into(),
            unit_bytes: unit_bytes.max(1),
        }
    }

    fn share_path(&self, share: &ShareHandle) -> BackendResult<PathBuf> {
        validate_segment(&share.name)?;
        Ok(self.base_path.join(&share.name))
    }

    fn directory_path(&self, directory: &DirectoryHandle) -> BackendResult<PathBuf> {
        validate_relative_path(&directory.path)?;
        let mut path = self.share_path(&directory.share)?;
        for segment in directory.path.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        Ok(path)
    }

    fn file_path(&self, file: &FileLocation) -> BackendResult<PathBuf> {
        validate_segment(&file.name)?;
        Ok(self.directory_path(&file.directory)?.join(&file.name))
    }

    /// Sum the size of every regular file below `root`.
    ///
    /// Entries removed while the walk is running (temp files, deleted
    /// objects, pruned directories) are skipped; only a missing `root`
    /// is an error.
    async fn total_bytes(root: &Path) -> io::Result<u64> {
        let mut total = 0u64;
        let mut entries = fs::read_dir(root).await?;
        let mut pending = Vec::new();
        loop {
            while let Some(entry) = entries.next_entry().await? {
                let meta = match entry.metadata().await {
                    Ok(meta) => meta,
                    Err(err) if err.kind() == ErrorKind::NotFound => continue,
                    Err(err) => return Err(err),
                };
                if meta.is_dir() {
                    pending.push(entry.path());
                } else if meta.is_file() {
                    total += meta.len();
                }
            }
            entries = loop {
                let Some(dir) = pending.pop() else {
                    return Ok(total);
                };
                match fs::read_dir(&dir).await {
                    Ok(next) => break next,
                    Err(err) if err.kind() == ErrorKind::NotFound => continue,
                    Err(err) => return Err(err),
                }
            };
        }
    }
}

/// Translate filesystem errors into backend terms for `what`.
fn map_io(err: io::Error, what: impl Into<String>) -> BackendError {
    match err.kind() {
        ErrorKind::NotFound => BackendError::NotFound(what.into()),
        ErrorKind::AlreadyExists => BackendError::AlreadyExists(what.into()),
        _ => BackendError::Io(err),
    }
}

/// Stream `content` into `out`, returning the byte count and MD5 digest.
async fn stream_into(out: &mut File, mut content: ByteStream) -> io::Result<(u64, md5::Digest)> {
    let mut written = 0u64;
    let mut digest = Context::new();
    while let Some(chunk) = content.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        digest.consume(&chunk);
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    out.sync_all().await?;
    Ok((written, digest.compute()))
}

async fn is_dir(path: &Path) -> BackendResult<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(BackendError::Io(err)),
    }
}

#[async_trait]
impl ShareBackend for LocalShareBackend {
    async fn share_exists(&self, share: &ShareHandle) -> BackendResult<bool> {
        is_dir(&self.share_path(share)?).await
    }

    async fn create_share_if_absent(&self, share: &ShareHandle) -> BackendResult<bool> {
        let path = self.share_path(share)?;
        match fs::create_dir(&path).await {
            Ok(()) => {
                debug!("created share directory {}", path.display());
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(map_io(err, share.name.clone())),
        }
    }

    async fn share_stats(&self, share: &ShareHandle) -> BackendResult<ShareStats> {
        let path = self.share_path(share)?;
        let bytes = Self::total_bytes(&path)
            .await
            .map_err(|err| map_io(err, share.name.clone()))?;
        Ok(ShareStats {
            usage: bytes.div_ceil(self.unit_bytes),
        })
    }

    async fn directory_exists(&self, directory: &DirectoryHandle) -> BackendResult<bool> {
        is_dir(&self.directory_path(directory)?).await
    }

    async fn create_directory(&self, directory: &DirectoryHandle) -> BackendResult<()> {
        let path = self.directory_path(directory)?;
        fs::create_dir(&path)
            .await
            .map_err(|err| map_io(err, directory.to_string()))
    }

    async fn file_exists(&self, file: &FileLocation) -> BackendResult<bool> {
        match fs::metadata(self.file_path(file)?).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(BackendError::Io(err)),
        }
    }

    /// Writes to a hidden temp file first, then hard-links it into place.
    ///
    /// Linking fails when the target exists, so a concurrent writer that
    /// resolved the same name gets `AlreadyExists` instead of clobbering.
    async fn write_file(
        &self,
        file: &FileLocation,
        content: ByteStream,
    ) -> BackendResult<WriteOutcome> {
        let target = self.file_path(file)?;
        let parent = self.directory_path(&file.directory)?;
        let tmp_path = parent.join(format!("{}{}", TMP_PREFIX, Uuid::new_v4()));

        let mut out = File::create(&tmp_path)
            .await
            .map_err(|err| map_io(err, file.directory.to_string()))?;
        let streamed = stream_into(&mut out, content).await;
        drop(out);

        let (bytes_written, digest) = match streamed {
            Ok(done) => done,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BackendError::Io(err));
            }
        };

        let linked = fs::hard_link(&tmp_path, &target).await;
        if let Err(err) = fs::remove_file(&tmp_path).await {
            warn!("failed to remove temp file {}: {}", tmp_path.display(), err);
        }
        linked.map_err(|err| map_io(err, file.to_string()))?;

        debug!("wrote {} bytes to {}", bytes_written, target.display());
        Ok(WriteOutcome {
            bytes_written,
            content_md5: Some(general_purpose::STANDARD.encode(digest.0)),
        })
    }

    async fn open_file(&self, file: &FileLocation) -> BackendResult<ObjectReader> {
        let handle = File::open(self.file_path(file)?)
            .await
            .map_err(|err| map_io(err, file.to_string()))?;
        Ok(Box::pin(handle))
    }

    async fn delete_file_if_exists(&self, file: &FileLocation) -> BackendResult<bool> {
        let path = self.file_path(file)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("removed physical file {}", path.display());
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", path.display());
                Ok(false)
            }
            Err(err) => Err(BackendError::Io(err)),
        }
    }

    /// Write, read back and delete a probe file under `base_path`.
    async fn health_check(&self) -> BackendResult<()> {
        let probe = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;
        if read? != b"readyz" {
            return Err(BackendError::Unavailable("file content mismatch".into()));
        }
        Ok(())
    }
}
