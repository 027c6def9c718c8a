//! Linear scan over `{prefix}01`, `{prefix}02`, ... for a writable share.
//!
//! The index of the last share found writable is remembered process-wide so
//! later placements resume the scan there instead of re-probing every full
//! share from 01. The memory is dropped after `cache_ttl` (so space freed by
//! deletions in earlier shares gets reused) and whenever a write fails.

use super::{error::StoreResult, share_probe::ShareCapacityProbe};
use crate::storage::ShareHandle;
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::{debug, info};

const FIRST_SHARE: u32 = 1;

#[derive(Clone, Copy, Debug)]
struct CachedShare {
    index: u32,
    selected_at: Instant,
}

#[derive(Clone)]
pub struct ShareSelector {
    probe: ShareCapacityProbe,
    prefix: String,
    /// `None` disables resuming: every scan starts at the first share.
    cache_ttl: Option<Duration>,
    last_writable: Arc<Mutex<Option<CachedShare>>>,
}

impl ShareSelector {
    pub fn new(probe: ShareCapacityProbe, prefix: impl Into<String>, cache_ttl: Option<Duration>) -> Self {
        Self {
            probe,
            prefix: prefix.into(),
            cache_ttl,
            last_writable: Arc::new(Mutex::new(None)),
        }
    }

    pub fn share_name(&self, index: u32) -> String {
        format!("{}{:02}", self.prefix, index)
    }

    /// Return the first share, in naming order from the resume point, that
    /// has room for another write. Absent shares are created on the way.
    pub async fn select_writable_share(&self) -> StoreResult<ShareHandle> {
        let mut index = self.resume_index();
        loop {
            let share = ShareHandle::new(self.share_name(index));
            if self.probe.ensure_usable(&share).await? {
                self.remember(index);
                debug!(share = %share.name, "selected writable share");
                return Ok(share);
            }
            info!(share = %share.name, "share at capacity, trying next");
            index += 1;
        }
    }

    /// Forget the resume point; the next scan starts at the first share.
    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.last_writable.lock() {
            *cached = None;
        }
    }

    fn resume_index(&self) -> u32 {
        let Some(ttl) = self.cache_ttl else {
            return FIRST_SHARE;
        };
        let Ok(mut cached) = self.last_writable.lock() else {
            return FIRST_SHARE;
        };
        match *cached {
            Some(entry) if entry.selected_at.elapsed() < ttl => entry.index,
            Some(_) => {
                *cached = None;
                FIRST_SHARE
            }
            None => FIRST_SHARE,
        }
    }

    fn remember(&self, index: u32) {
        if self.cache_ttl.is_none() {
            return;
        }
        if let Ok(mut cached) = self.last_writable.lock() {
            *cached = Some(CachedShare {
                index,
                selected_at: Instant::now(),
            });
        }
    }
}
