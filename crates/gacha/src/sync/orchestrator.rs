//! Sync every pool category for the session's account

use std::time::Instant;

use log::{info, warn};

use super::{SyncError, full_sync, incremental_sync};
use crate::config::SessionContext;
use crate::models::PoolCategory;
use crate::remote::RemoteApi;
use crate::storage::{BackupGuard, RecordStore};

/// How each category is reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Append only what is newer than the local watermark
    Incremental,
    /// Refetch everything, back up, merge and replace
    Full,
}

/// Result of syncing one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOutcome {
    pub category: PoolCategory,
    pub mode: SyncMode,
    /// Records appended (incremental) or stored after the rebuild (full)
    pub count: usize,
}

impl CategoryOutcome {
    pub fn summary(&self) -> String {
        match self.mode {
            SyncMode::Incremental => {
                format!("{}: incremental sync added {} records", self.category, self.count)
            }
            SyncMode::Full => {
                format!("{}: full sync stored {} records", self.category, self.count)
            }
        }
    }
}

/// Statistics from a sync run
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Account the records were written under
    pub uid: String,
    pub outcomes: Vec<CategoryOutcome>,
    pub duration_ms: u64,
}

impl SyncReport {
    /// Identity line followed by one line per category
    pub fn summary_lines(&self) -> Vec<String> {
        std::iter::once(format!("UID: {}", self.uid))
            .chain(self.outcomes.iter().map(CategoryOutcome::summary))
            .collect()
    }

    /// Records added or stored across all categories
    pub fn total_records(&self) -> usize {
        self.outcomes.iter().map(|o| o.count).sum()
    }
}

/// Work out which account to write under
///
/// The uid derived from the access token wins over the cached one; a
/// mismatch is logged, since writing under a stale uid would mix accounts.
pub fn resolve_uid<A: RemoteApi + ?Sized>(
    api: &A,
    session: &SessionContext,
) -> Result<String, SyncError> {
    if !session.has_access_token() {
        return Err(SyncError::MissingCredential);
    }

    let fresh = api.fetch_uid().map_err(SyncError::identity)?;

    if let Some(cached) = session.cached_uid()
        && cached != fresh
    {
        warn!(
            "UID mismatch: session has {}, access token belongs to {}; using the latter",
            cached, fresh
        );
    }

    Ok(fresh)
}

/// Sync every category and return a structured report
///
/// The first failing category aborts the run.
pub fn sync_categories<A: RemoteApi + ?Sized>(
    api: &A,
    store: &dyn RecordStore,
    backup: &dyn BackupGuard,
    session: &SessionContext,
    mode: SyncMode,
    categories: &[PoolCategory],
) -> Result<SyncReport, SyncError> {
    let start = Instant::now();
    let uid = resolve_uid(api, session)?;
    info!("Starting {:?} sync for UID {}", mode, uid);

    let mut outcomes = Vec::with_capacity(categories.len());
    for &category in categories {
        let count = match mode {
            SyncMode::Incremental => incremental_sync(api, store, &uid, category)?,
            SyncMode::Full => full_sync(api, store, backup, &uid, category)?,
        };
        outcomes.push(CategoryOutcome {
            category,
            mode,
            count,
        });
    }

    let report = SyncReport {
        uid,
        outcomes,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "{:?} sync for UID {} complete: {} records over {} categories in {}ms",
        mode,
        report.uid,
        report.total_records(),
        report.outcomes.len(),
        report.duration_ms
    );

    Ok(report)
}

/// Sync all known categories, returning the summary lines
pub fn sync<A: RemoteApi + ?Sized>(
    api: &A,
    store: &dyn RecordStore,
    backup: &dyn BackupGuard,
    session: &SessionContext,
    mode: SyncMode,
) -> Result<Vec<String>, SyncError> {
    let report = sync_categories(api, store, backup, session, mode, &PoolCategory::ALL)?;
    Ok(report.summary_lines())
}
