//! Gacha crate - Pull history synchronization
//!
//! This crate keeps a local copy of a game account's gacha pull history in
//! step with the paginated history the game service exposes:
//! - Domain models (PoolCategory, PullRecord, LocalRecord)
//! - HTTP client for the gacha record service
//! - Storage trait abstractions with SQLite and in-memory backends
//! - Incremental and full sync engines
//! - Settings and session loading
//!
//! Everything runs synchronously and sequentially; a page cursor is only
//! known once the previous page has arrived.

pub mod config;
pub mod models;
pub mod remote;
pub mod storage;
pub mod sync;

pub use self::config::{SessionContext, Settings};
pub use models::{LocalRecord, PoolCategory, PullRecord, RecordKey};
pub use remote::{FetchError, GachaClient, RecordPage, RemoteApi, ScriptedApi};
pub use storage::{BackupGuard, BackupInfo, InMemoryRecordStore, RecordStore, SqliteRecordStore};
pub use sync::{
    CategoryOutcome, PageWalker, SyncError, SyncMode, SyncReport, full_sync, incremental_sync,
    merge_records, resolve_uid, sync, sync_categories,
};
