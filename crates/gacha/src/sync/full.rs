//! Full resync: rebuild a category from the complete remote history
//!
//! The category is replaced wholesale, so every local record has to end up
//! in the merged sequence: records the remote still serves are taken from
//! the remote, records it no longer serves are carried over from the store.

use std::collections::HashMap;

use log::{debug, info, warn};

use super::{SyncError, fetch_all};
use crate::models::{LocalRecord, PoolCategory, RecordKey};
use crate::remote::RemoteApi;
use crate::storage::{BackupGuard, RecordStore};

/// Merge chronological remote records with local records of the same window
///
/// Both inputs must be in ascending timestamp order. A local record whose
/// key the remote also serves is dropped in favour of the remote one. Keys
/// are counted rather than collapsed, since a multi-pull can legitimately
/// yield the same item twice at one timestamp; each remote occurrence
/// absorbs one local occurrence. On equal timestamps remote records come
/// first and each side keeps its own order.
pub fn merge_records(remote: Vec<LocalRecord>, local: Vec<LocalRecord>) -> Vec<LocalRecord> {
    let mut served: HashMap<RecordKey, usize> = HashMap::new();
    for record in &remote {
        *served.entry(record.key()).or_default() += 1;
    }

    let retained: Vec<LocalRecord> = local
        .into_iter()
        .filter(|record| match served.get_mut(&record.key()) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                false
            }
            _ => true,
        })
        .collect();

    let mut merged = Vec::with_capacity(remote.len() + retained.len());
    let mut remote = remote.into_iter().peekable();
    let mut retained = retained.into_iter().peekable();

    loop {
        let take_local = match (remote.peek(), retained.peek()) {
            (Some(r), Some(l)) => l.timestamp < r.timestamp,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_local {
            retained.next()
        } else {
            remote.next()
        };
        merged.extend(next);
    }

    merged
}

/// Rebuild a category from a full remote fetch
///
/// Returns the number of records stored for the category afterwards. An
/// empty remote history leaves the store untouched and takes no backup.
pub fn full_sync<A: RemoteApi + ?Sized>(
    api: &A,
    store: &dyn RecordStore,
    backup: &dyn BackupGuard,
    uid: &str,
    category: PoolCategory,
) -> Result<usize, SyncError> {
    let mut remote = fetch_all(api, category)?;

    if remote.is_empty() {
        warn!(
            "UID {} {}: remote returned no records, keeping local history as is",
            uid, category
        );
        return Ok(0);
    }

    let snapshot = backup
        .snapshot()
        .map_err(|source| SyncError::Backup { category, source })?;
    debug!("Backup before full sync of {}: {}", category, snapshot.location);

    remote.reverse();
    if !remote.is_sorted_by_key(|r| r.timestamp) {
        warn!(
            "UID {} {}: remote history is not in timestamp order, merge may misplace records",
            uid, category
        );
    }

    let boundary = remote[0].timestamp;
    let mut older = store
        .query(uid, category, 0)
        .map_err(|e| SyncError::storage(category, "reading local history", e))?;
    // Everything at or after the oldest remote record overlaps the fetch
    let tail = older.split_off(older.partition_point(|r| r.timestamp < boundary));

    let remote: Vec<LocalRecord> = remote
        .into_iter()
        .map(|record| record.into_local(uid))
        .collect();

    let mut merged = older;
    merged.extend(merge_records(remote, tail));

    store
        .replace_category(uid, category, &merged)
        .map_err(|e| SyncError::storage(category, "replacing local history", e))?;

    info!(
        "UID {} {}: full sync stored {} records",
        uid,
        category,
        merged.len()
    );
    Ok(merged.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PullRecord;
    use crate::remote::{FetchError, ScriptedApi};
    use crate::storage::InMemoryRecordStore;

    const UID: &str = "20001234";
    const POOL: PoolCategory = PoolCategory::Standard;

    fn pull(item_id: i64, timestamp: i64) -> PullRecord {
        PullRecord::new(POOL, 1001, item_id, timestamp)
    }

    fn local(item_id: i64, timestamp: i64) -> LocalRecord {
        pull(item_id, timestamp).into_local(UID)
    }

    fn keys(records: &[LocalRecord]) -> Vec<(i64, i64)> {
        records.iter().map(|r| (r.item_id, r.timestamp)).collect()
    }

    #[test]
    fn test_merge_dedups_overlap() {
        let remote = vec![local(1, 100), local(2, 200), local(3, 300)];
        let tail = vec![local(1, 100)];

        let merged = merge_records(remote, tail);

        assert_eq!(keys(&merged), vec![(1, 100), (2, 200), (3, 300)]);
    }

    #[test]
    fn test_merge_keeps_local_only_records_in_order() {
        let remote = vec![local(1, 100), local(3, 300)];
        let tail = vec![local(1, 100), local(2, 200), local(4, 400)];

        let merged = merge_records(remote, tail);

        assert_eq!(keys(&merged), vec![(1, 100), (2, 200), (3, 300), (4, 400)]);
    }

    #[test]
    fn test_merge_prefers_remote_on_conflict() {
        let mut remote_record = local(5, 500);
        remote_record.pool_id = 9999;
        let merged = merge_records(vec![remote_record], vec![local(5, 500)]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pool_id, 9999);
    }

    #[test]
    fn test_merge_counts_repeated_keys() {
        // A ten-pull that produced the same item twice
        let remote = vec![local(8, 700), local(8, 700), local(9, 700)];
        let tail = vec![local(8, 700), local(8, 700), local(9, 700)];

        assert_eq!(merge_records(remote, tail).len(), 3);
    }

    #[test]
    fn test_merge_equal_timestamps_remote_first() {
        let remote = vec![local(1, 100)];
        let tail = vec![local(2, 100)];

        let merged = merge_records(remote, tail);

        assert_eq!(keys(&merged), vec![(1, 100), (2, 100)]);
    }

    #[test]
    fn test_empty_remote_is_noop() {
        let store = InMemoryRecordStore::new();
        store.append(&[local(1, 100), local(2, 200)]).unwrap();
        let api = ScriptedApi::new(UID);

        let stored = full_sync(&api, &store, &store, UID, POOL).unwrap();

        assert_eq!(stored, 0);
        assert_eq!(store.snapshot_count(), 0);
        assert_eq!(store.count(UID, POOL).unwrap(), 2);
    }

    #[test]
    fn test_full_sync_into_empty_store() {
        let store = InMemoryRecordStore::new();
        let api = ScriptedApi::new(UID).with_pages(
            POOL,
            vec![vec![pull(3, 300), pull(2, 200)], vec![pull(1, 100)]],
        );

        let stored = full_sync(&api, &store, &store, UID, POOL).unwrap();

        assert_eq!(stored, 3);
        assert_eq!(store.snapshot_count(), 1);
        let records = store.query(UID, POOL, 0).unwrap();
        assert_eq!(keys(&records), vec![(1, 100), (2, 200), (3, 300)]);
    }

    #[test]
    fn test_keeps_records_older_than_remote_window() {
        let store = InMemoryRecordStore::new();
        // The remote only serves the last few pulls
        store
            .append(&[local(1, 100), local(2, 200), local(3, 300)])
            .unwrap();
        let api = ScriptedApi::new(UID)
            .with_pages(POOL, vec![vec![pull(4, 400), pull(3, 300)]]);

        let stored = full_sync(&api, &store, &store, UID, POOL).unwrap();

        assert_eq!(stored, 4);
        let records = store.query(UID, POOL, 0).unwrap();
        assert_eq!(keys(&records), vec![(1, 100), (2, 200), (3, 300), (4, 400)]);
    }

    #[test]
    fn test_full_sync_is_idempotent() {
        let store = InMemoryRecordStore::new();
        store.append(&[local(1, 100)]).unwrap();
        let api = ScriptedApi::new(UID).with_pages(
            POOL,
            vec![vec![pull(4, 400), pull(3, 300)], vec![pull(2, 200)]],
        );

        full_sync(&api, &store, &store, UID, POOL).unwrap();
        let first = store.query(UID, POOL, 0).unwrap();
        full_sync(&api, &store, &store, UID, POOL).unwrap();
        let second = store.query(UID, POOL, 0).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.len(), 4);
    }

    #[test]
    fn test_fetch_failure_takes_no_backup() {
        let store = InMemoryRecordStore::new();
        store.append(&[local(1, 100)]).unwrap();
        let api = ScriptedApi::new(UID)
            .with_pages(POOL, vec![vec![pull(3, 300)], vec![pull(2, 200)]])
            .fail_page(POOL, 1, FetchError::Http { status: 504 });

        assert!(full_sync(&api, &store, &store, UID, POOL).is_err());
        assert_eq!(store.snapshot_count(), 0);
        assert_eq!(store.count(UID, POOL).unwrap(), 1);
    }

    #[test]
    fn test_backup_failure_leaves_store_untouched() {
        let store = InMemoryRecordStore::new();
        store.append(&[local(1, 100)]).unwrap();
        store.set_fail_snapshots(true);
        let api = ScriptedApi::new(UID).with_pages(POOL, vec![vec![pull(2, 200)]]);

        let err = full_sync(&api, &store, &store, UID, POOL).unwrap_err();

        assert!(matches!(err, SyncError::Backup { .. }));
        assert_eq!(keys(&store.query(UID, POOL, 0).unwrap()), vec![(1, 100)]);
    }

    #[test]
    fn test_write_failure_after_backup_keeps_backup() {
        let store = InMemoryRecordStore::new();
        store.append(&[local(1, 100)]).unwrap();
        let api = ScriptedApi::new(UID).with_pages(POOL, vec![vec![pull(2, 200)]]);
        store.set_fail_writes(true);

        let err = full_sync(&api, &store, &store, UID, POOL).unwrap_err();

        assert!(matches!(
            err,
            SyncError::Storage {
                step: "replacing local history",
                ..
            }
        ));
        let backed_up = store.snapshot_records(UID, POOL).unwrap();
        assert_eq!(keys(&backed_up), vec![(1, 100)]);
    }
}
