//! SQLite-based record storage with file backups

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use rusqlite_migration::{M, Migrations};

use super::{BackupGuard, BackupInfo, RecordStore};
use crate::models::{LocalRecord, PoolCategory};

/// Backup file naming: `records-<utc timestamp>[_<n>].db`
const BACKUP_PREFIX: &str = "records-";
const BACKUP_SUFFIX: &str = ".db";

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE pull_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uid TEXT NOT NULL,
                pool_type INTEGER NOT NULL,
                pool_id INTEGER NOT NULL,
                item_id INTEGER NOT NULL,
                gacha_timestamp INTEGER NOT NULL
            );

            CREATE INDEX idx_pull_records_scope
                ON pull_records(uid, pool_type, gacha_timestamp);
            "#,
        ),
    ])
}

/// SQLite-based record storage
///
/// Also acts as the backup guard: snapshots are written next to the
/// database with `VACUUM INTO`.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    backup_dir: PathBuf,
    /// Number of backup files to keep; 0 keeps all
    keep_backups: usize,
}

impl SqliteRecordStore {
    /// Open (or create) the database at `db_path`
    ///
    /// Backups go to `backup_dir`, created on first use.
    pub fn new(db_path: impl AsRef<Path>, backup_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
            backup_dir: backup_dir.into(),
            keep_backups: 0,
        })
    }

    /// Keep only the newest `keep` backups (0 keeps all)
    pub fn with_keep_backups(mut self, keep: usize) -> Self {
        self.keep_backups = keep;
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Backup files in the backup directory, oldest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups: Vec<PathBuf> = std::fs::read_dir(&self.backup_dir)
            .with_context(|| format!("Failed to list backups in {:?}", self.backup_dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| {
                        name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_SUFFIX)
                    })
            })
            .collect();

        // Names embed a sortable timestamp
        backups.sort();
        Ok(backups)
    }

    /// Next backup path for `created_at`
    ///
    /// `VACUUM INTO` refuses to overwrite, so snapshots taken within the same
    /// millisecond get a counter suffix above any existing one, keeping name
    /// order equal to creation order.
    fn next_backup_path(&self, created_at: &DateTime<Utc>) -> Result<PathBuf> {
        let stem = format!("{BACKUP_PREFIX}{}", created_at.format("%Y%m%d-%H%M%S%.3f"));

        let last = self.list_backups()?.iter().rev().find_map(|path| {
            let rest = path
                .file_name()?
                .to_str()?
                .strip_prefix(&stem)?
                .strip_suffix(BACKUP_SUFFIX)?;
            Some(rest.strip_prefix('_').and_then(|n| n.parse::<u32>().ok()).unwrap_or(0))
        });

        let name = match last {
            None => format!("{stem}{BACKUP_SUFFIX}"),
            Some(n) => format!("{stem}_{:03}{BACKUP_SUFFIX}", n + 1),
        };
        Ok(self.backup_dir.join(name))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    fn insert_records(tx: &Transaction<'_>, records: &[LocalRecord]) -> Result<()> {
        let mut stmt = tx.prepare(
            "INSERT INTO pull_records (uid, pool_type, pool_id, item_id, gacha_timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )?;

        for record in records {
            stmt.execute(params![
                record.uid,
                record.category.id(),
                record.pool_id,
                record.item_id,
                record.timestamp
            ])?;
        }

        Ok(())
    }

    fn prune_backups(&self) -> Result<()> {
        if self.keep_backups == 0 {
            return Ok(());
        }

        let backups = self.list_backups()?;
        let excess = backups.len().saturating_sub(self.keep_backups);
        for path in &backups[..excess] {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove old backup {:?}", path))?;
            debug!("Removed old backup {}", path.display());
        }

        Ok(())
    }
}

impl RecordStore for SqliteRecordStore {
    fn query(&self, uid: &str, category: PoolCategory, since: i64) -> Result<Vec<LocalRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT pool_id, item_id, gacha_timestamp FROM pull_records
             WHERE uid = ? AND pool_type = ? AND gacha_timestamp >= ?
             ORDER BY gacha_timestamp ASC, id ASC",
        )?;

        let records = stmt
            .query_map(params![uid, category.id(), since], |row| {
                Ok(LocalRecord {
                    uid: uid.to_string(),
                    category,
                    pool_id: row.get(0)?,
                    item_id: row.get(1)?,
                    timestamp: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn latest(&self, uid: &str, category: PoolCategory) -> Result<Option<LocalRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT pool_id, item_id, gacha_timestamp FROM pull_records
                 WHERE uid = ? AND pool_type = ?
                 ORDER BY gacha_timestamp DESC, id DESC
                 LIMIT 1",
                params![uid, category.id()],
                |row| {
                    Ok(LocalRecord {
                        uid: uid.to_string(),
                        category,
                        pool_id: row.get(0)?,
                        item_id: row.get(1)?,
                        timestamp: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    fn append(&self, records: &[LocalRecord]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::insert_records(&tx, records)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_category(&self, uid: &str, category: PoolCategory) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM pull_records WHERE uid = ? AND pool_type = ?",
            params![uid, category.id()],
        )?;
        Ok(removed)
    }

    fn replace_category(
        &self,
        uid: &str,
        category: PoolCategory,
        records: &[LocalRecord],
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM pull_records WHERE uid = ? AND pool_type = ?",
            params![uid, category.id()],
        )?;
        Self::insert_records(&tx, records)?;
        tx.commit()?;
        Ok(())
    }

    fn count(&self, uid: &str, category: PoolCategory) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pull_records WHERE uid = ? AND pool_type = ?",
            params![uid, category.id()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl BackupGuard for SqliteRecordStore {
    fn snapshot(&self) -> Result<BackupInfo> {
        std::fs::create_dir_all(&self.backup_dir).with_context(|| {
            format!("Failed to create backup directory {:?}", self.backup_dir)
        })?;

        let created_at = Utc::now();

        let path = {
            let conn = self.lock()?;
            let path = self.next_backup_path(&created_at)?;
            conn.execute("VACUUM INTO ?", [path.to_string_lossy().into_owned()])
                .with_context(|| format!("Failed to write backup to {:?}", path))?;
            path
        };
        info!("Backed up record database to {}", path.display());

        self.prune_backups()?;

        Ok(BackupInfo {
            location: path.display().to_string(),
            created_at,
        })
    }
}
