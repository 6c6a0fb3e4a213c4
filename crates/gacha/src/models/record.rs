//! Pull record models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PoolCategory;

/// Deduplication identity of a pull
///
/// Two pulls with the same item at the same timestamp are treated as the
/// same event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub item_id: i64,
    pub timestamp: i64,
}

impl RecordKey {
    pub fn new(item_id: i64, timestamp: i64) -> Self {
        Self { item_id, timestamp }
    }
}

/// A pull as served by the remote history API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRecord {
    pub category: PoolCategory,
    /// Banner instance the pull was made on
    pub pool_id: i64,
    pub item_id: i64,
    /// Unix seconds
    pub timestamp: i64,
}

impl PullRecord {
    pub fn new(category: PoolCategory, pool_id: i64, item_id: i64, timestamp: i64) -> Self {
        Self {
            category,
            pool_id,
            item_id,
            timestamp,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.item_id, self.timestamp)
    }

    /// Attach the account scope, producing the persisted shape
    pub fn into_local(self, uid: &str) -> LocalRecord {
        LocalRecord {
            uid: uid.to_string(),
            category: self.category,
            pool_id: self.pool_id,
            item_id: self.item_id,
            timestamp: self.timestamp,
        }
    }
}

/// A pull persisted in the local record store
///
/// Records are only ever inserted or bulk-deleted per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecord {
    /// Account the record belongs to
    pub uid: String,
    pub category: PoolCategory,
    pub pool_id: i64,
    pub item_id: i64,
    pub timestamp: i64,
}

impl LocalRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.item_id, self.timestamp)
    }

    /// Pull time as a UTC datetime, if the timestamp is in range
    pub fn pulled_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
    }
}
