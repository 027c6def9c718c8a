//! In-memory [`ShareBackend`] used by unit tests.
//!
//! Behaves like a hierarchical share service: a directory can only be
//! created under an existing parent and writes never overwrite. Usage can be
//! pinned per share, failures injected, and calls counted per operation.

use super::{
    BackendError, BackendResult, ByteStream, DirectoryHandle, FileLocation, ObjectReader,
    ShareBackend, ShareHandle, ShareStats, WriteOutcome,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::{
    collections::{HashMap, HashSet},
    io::Cursor,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

#[derive(Default)]
struct MemShare {
    directories: HashSet<String>,
    files: HashMap<(String, String), Bytes>,
    usage_override: Option<u64>,
}

impl MemShare {
    fn usage(&self) -> u64 {
        self.usage_override
            .unwrap_or_else(|| self.files.values().map(|b| b.len() as u64).sum())
    }

    fn has_directory(&self, path: &str) -> bool {
        path.is_empty() || self.directories.contains(path)
    }
}

#[derive(Default)]
pub struct MemoryShareBackend {
    shares: Mutex<HashMap<String, MemShare>>,
    unavailable: AtomicBool,
    fail_writes: AtomicBool,
    vanish_on_write: AtomicBool,
    injected_conflicts: AtomicUsize,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MemoryShareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `share` and pin its reported usage.
    pub fn seed_share(&self, share: &str, usage: u64) {
        let mut shares = self.shares.lock().unwrap();
        shares.entry(share.to_string()).or_default().usage_override = Some(usage);
    }

    pub fn set_unavailable(&self, value: bool) {
        self.unavailable.store(value, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, value: bool) {
        self.fail_writes.store(value, Ordering::SeqCst);
    }

    /// Writes find their target directory removed, as if deleted externally
    /// between provisioning and the write.
    pub fn set_vanish_on_write(&self, value: bool) {
        self.vanish_on_write.store(value, Ordering::SeqCst);
    }

    /// The next `count` writes lose a race: another writer takes the name first.
    pub fn inject_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn share_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shares.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn directory_count(&self, share: &str) -> usize {
        self.shares
            .lock()
            .unwrap()
            .get(share)
            .map(|s| s.directories.len())
            .unwrap_or(0)
    }

    pub fn file_content(&self, file: &FileLocation) -> Option<Bytes> {
        self.shares
            .lock()
            .unwrap()
            .get(&file.directory.share.name)
            .and_then(|s| s.files.get(&file_key(file)).cloned())
    }

    fn record(&self, op: &'static str) -> BackendResult<()> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("injected outage".into()));
        }
        Ok(())
    }

    fn with_share<T>(
        &self,
        share: &ShareHandle,
        f: impl FnOnce(&mut MemShare) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut shares = self.shares.lock().unwrap();
        let entry = shares
            .get_mut(&share.name)
            .ok_or_else(|| BackendError::NotFound(share.name.clone()))?;
        f(entry)
    }
}

fn file_key(file: &FileLocation) -> (String, String) {
    (file.directory.path.clone(), file.name.clone())
}

#[async_trait]
impl ShareBackend for MemoryShareBackend {
    async fn share_exists(&self, share: &ShareHandle) -> BackendResult<bool> {
        self.record("share_exists")?;
        Ok(self.shares.lock().unwrap().contains_key(&share.name))
    }

    async fn create_share_if_absent(&self, share: &ShareHandle) -> BackendResult<bool> {
        self.record("create_share")?;
        let mut shares = self.shares.lock().unwrap();
        if shares.contains_key(&share.name) {
            return Ok(false);
        }
        shares.insert(share.name.clone(), MemShare::default());
        Ok(true)
    }

    async fn share_stats(&self, share: &ShareHandle) -> BackendResult<ShareStats> {
        self.record("share_stats")?;
        self.with_share(share, |s| Ok(ShareStats { usage: s.usage() }))
    }

    async fn directory_exists(&self, directory: &DirectoryHandle) -> BackendResult<bool> {
        self.record("directory_exists")?;
        self.with_share(&directory.share, |s| Ok(s.has_directory(&directory.path)))
    }

    async fn create_directory(&self, directory: &DirectoryHandle) -> BackendResult<()> {
        self.record("create_directory")?;
        let parent = directory
            .parent()
            .ok_or_else(|| BackendError::AlreadyExists(directory.to_string()))?;
        self.with_share(&directory.share, |s| {
            if !s.has_directory(&parent.path) {
                return Err(BackendError::NotFound(parent.to_string()));
            }
            if !s.directories.insert(directory.path.clone()) {
                return Err(BackendError::AlreadyExists(directory.to_string()));
            }
            Ok(())
        })
    }

    async fn file_exists(&self, file: &FileLocation) -> BackendResult<bool> {
        self.record("file_exists")?;
        self.with_share(&file.directory.share, |s| {
            Ok(s.files.contains_key(&file_key(file)))
        })
    }

    async fn write_file(
        &self,
        file: &FileLocation,
        mut content: ByteStream,
    ) -> BackendResult<WriteOutcome> {
        self.record("write_file")?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("injected write failure".into()));
        }

        let mut buf = BytesMut::new();
        while let Some(chunk) = content.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let data = buf.freeze();

        let lose_race = self
            .injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let vanish = self.vanish_on_write.load(Ordering::SeqCst);

        self.with_share(&file.directory.share, |s| {
            if vanish {
                s.directories.remove(&file.directory.path);
            }
            if !s.has_directory(&file.directory.path) {
                return Err(BackendError::NotFound(file.directory.to_string()));
            }
            let key = file_key(file);
            if lose_race {
                s.files.insert(key.clone(), Bytes::from_static(b"winner"));
            }
            if s.files.contains_key(&key) {
                return Err(BackendError::AlreadyExists(file.to_string()));
            }
            let written = data.len() as u64;
            s.files.insert(key, data);
            Ok(WriteOutcome {
                bytes_written: written,
                content_md5: None,
            })
        })
    }

    async fn open_file(&self, file: &FileLocation) -> BackendResult<ObjectReader> {
        self.record("open_file")?;
        let data = self.with_share(&file.directory.share, |s| {
            s.files
                .get(&file_key(file))
                .cloned()
                .ok_or_else(|| BackendError::NotFound(file.to_string()))
        })?;
        Ok(Box::pin(Cursor::new(data.to_vec())))
    }

    async fn delete_file_if_exists(&self, file: &FileLocation) -> BackendResult<bool> {
        self.record("delete_file")?;
        let mut shares = self.shares.lock().unwrap();
        Ok(shares
            .get_mut(&file.directory.share.name)
            .map(|s| s.files.remove(&file_key(file)).is_some())
            .unwrap_or(false))
    }

    async fn health_check(&self) -> BackendResult<()> {
        self.record("health_check")
    }
}
