//! In-memory storage implementation
//!
//! Used by tests and by callers that keep history in memory only.

use anyhow::{Result, anyhow, bail};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{BackupGuard, BackupInfo, RecordStore};
use crate::models::{LocalRecord, PoolCategory};

type Scope = (String, PoolCategory);
type Records = HashMap<Scope, Vec<LocalRecord>>;

/// In-memory implementation of RecordStore and BackupGuard
///
/// Snapshots are full clones of the record map.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Records>,
    snapshots: RwLock<Vec<Records>>,
    /// When set, every write fails (simulates a broken disk)
    fail_writes: AtomicBool,
    /// When set, every snapshot fails
    fail_snapshots: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_snapshots(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }

    /// Number of snapshots taken so far
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Records of a category as they were in the most recent snapshot
    pub fn snapshot_records(&self, uid: &str, category: PoolCategory) -> Option<Vec<LocalRecord>> {
        let snapshots = self.snapshots.read().ok()?;
        let latest = snapshots.last()?;
        Some(
            latest
                .get(&(uid.to_string(), category))
                .cloned()
                .unwrap_or_default(),
        )
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Records>> {
        self.records
            .read()
            .map_err(|_| anyhow!("record store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Records>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("record store is read-only");
        }
        self.records
            .write()
            .map_err(|_| anyhow!("record store lock poisoned"))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn query(&self, uid: &str, category: PoolCategory, since: i64) -> Result<Vec<LocalRecord>> {
        let records = self.read()?;
        Ok(records
            .get(&(uid.to_string(), category))
            .map(|list| {
                list.iter()
                    .filter(|r| r.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn append(&self, new_records: &[LocalRecord]) -> Result<()> {
        let mut records = self.write()?;
        for record in new_records {
            records
                .entry((record.uid.clone(), record.category))
                .or_default()
                .push(record.clone());
        }
        // Stable sort keeps insertion order for equal timestamps
        for list in records.values_mut() {
            list.sort_by_key(|r| r.timestamp);
        }
        Ok(())
    }

    fn delete_category(&self, uid: &str, category: PoolCategory) -> Result<usize> {
        let mut records = self.write()?;
        Ok(records
            .remove(&(uid.to_string(), category))
            .map_or(0, |list| list.len()))
    }
}

impl BackupGuard for InMemoryRecordStore {
    fn snapshot(&self) -> Result<BackupInfo> {
        if self.fail_snapshots.load(Ordering::SeqCst) {
            bail!("snapshot target unavailable");
        }
        let copy = self.read()?.clone();
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| anyhow!("snapshot list lock poisoned"))?;
        snapshots.push(copy);

        Ok(BackupInfo {
            location: format!("memory snapshot #{}", snapshots.len()),
            created_at: Utc::now(),
        })
    }
}
