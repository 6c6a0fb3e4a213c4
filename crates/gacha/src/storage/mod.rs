//! Storage traits and implementations
//!
//! This module defines the storage abstraction for pull records and the
//! backup guard taken before destructive writes. The trait-based design
//! allows swapping between in-memory and SQLite backends.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryRecordStore;
pub use sqlite::SqliteRecordStore;
pub use traits::{BackupGuard, BackupInfo, RecordStore};
