//! Storage trait definitions

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{LocalRecord, PoolCategory};

/// Trait for pull record storage
///
/// Records are scoped by account uid and pool category. Within a scope,
/// queries return records in ascending timestamp order; records sharing a
/// timestamp come back in insertion order.
pub trait RecordStore: Send + Sync {
    /// Records for a category with `timestamp >= since`, ascending
    fn query(&self, uid: &str, category: PoolCategory, since: i64) -> Result<Vec<LocalRecord>>;

    /// The most recent record for a category
    fn latest(&self, uid: &str, category: PoolCategory) -> Result<Option<LocalRecord>> {
        Ok(self.query(uid, category, 0)?.pop())
    }

    /// Append records; each record carries its own uid and category
    fn append(&self, records: &[LocalRecord]) -> Result<()>;

    /// Delete every record of a category, returning how many were removed
    fn delete_category(&self, uid: &str, category: PoolCategory) -> Result<usize>;

    /// Replace a category's records with `records`
    ///
    /// Backends that support transactions should override this so a failure
    /// cannot leave the category empty.
    fn replace_category(
        &self,
        uid: &str,
        category: PoolCategory,
        records: &[LocalRecord],
    ) -> Result<()> {
        self.delete_category(uid, category)?;
        self.append(records)
    }

    /// Number of records stored for a category
    fn count(&self, uid: &str, category: PoolCategory) -> Result<usize> {
        Ok(self.query(uid, category, 0)?.len())
    }
}

/// Point-in-time copy of the record store
///
/// Taken before any destructive write.
pub trait BackupGuard {
    fn snapshot(&self) -> Result<BackupInfo>;
}

/// Where a backup went
#[derive(Debug, Clone)]
pub struct BackupInfo {
    /// File path, or a description for non-file backends
    pub location: String,
    pub created_at: DateTime<Utc>,
}
