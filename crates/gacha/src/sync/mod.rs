//! Sync engine for pull history
//!
//! Keeps the local record store in step with the remote history, one
//! category at a time, either by appending what is new (incremental) or by
//! rebuilding the category from a complete fetch (full).

mod error;
mod full;
mod incremental;
mod orchestrator;
mod walker;

pub use error::SyncError;
pub use full::{full_sync, merge_records};
pub use incremental::{collect_newer, incremental_sync};
pub use orchestrator::{
    CategoryOutcome, SyncMode, SyncReport, resolve_uid, sync, sync_categories,
};
pub use walker::{PageWalker, fetch_all};
