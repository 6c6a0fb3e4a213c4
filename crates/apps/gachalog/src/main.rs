//! gachalog - keep a local copy of your gacha pull history
//!
//! This is the command-line entry point: it loads settings and the saved
//! session, opens the record database and hands off to the sync engine.

use anyhow::{Context, Result, bail};
use clap::Parser;
use gacha::{
    BackupGuard, GachaClient, RecordStore, SessionContext, Settings, SqliteRecordStore, SyncMode,
};
use log::error;

mod cli;

use cli::{Cli, Commands, SessionAction};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    let settings = Settings::load()?;

    match &cli.command {
        Commands::Sync { full } => {
            let mode = if *full { SyncMode::Full } else { SyncMode::Incremental };
            run_sync(&cli, &settings, mode)
        }
        Commands::List { pool, limit } => run_list(&cli, &settings, *pool, *limit),
        Commands::Session { action } => run_session(&cli, action),
        Commands::Backup => {
            let store = open_store(&cli, &settings)?;
            let info = store.snapshot()?;
            println!("Backup written to {}", info.location);
            Ok(())
        }
    }
}

/// Saved session with any command-line overrides applied
fn load_session(cli: &Cli) -> Result<SessionContext> {
    Ok(SessionContext::load()?.overlay(cli.token.clone(), cli.url.clone(), cli.uid.clone()))
}

fn open_store(cli: &Cli, settings: &Settings) -> Result<SqliteRecordStore> {
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => settings.database_path()?,
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {:?}", parent))?;
    }

    let store = SqliteRecordStore::new(&db_path, settings.backup_dir(&db_path))?
        .with_keep_backups(settings.keep_backups);
    Ok(store)
}

fn run_sync(cli: &Cli, settings: &Settings, mode: SyncMode) -> Result<()> {
    let mut session = load_session(cli)?;
    if !session.has_access_token() {
        bail!("No access token; save one with `gachalog session set --token <TOKEN>`");
    }
    if session.gacha_url.trim().is_empty() {
        bail!("No gacha record url; save one with `gachalog session set --url <URL>`");
    }

    let store = open_store(cli, settings)?;
    let client = GachaClient::new(&session.gacha_url, session.access_token.clone())?
        .with_timeout(settings.request_timeout())
        .with_max_attempts(settings.max_retries);

    let report = gacha::sync_categories(
        &client,
        &store,
        &store,
        &session,
        mode,
        &gacha::PoolCategory::ALL,
    )?;

    for line in report.summary_lines() {
        println!("{}", line);
    }

    // Remember the uid the token resolved to for the next run
    if session.cached_uid() != Some(report.uid.as_str()) {
        session.uid = Some(report.uid.clone());
        if let Err(e) = session.save() {
            error!("Failed to save session: {:#}", e);
        }
    }

    Ok(())
}

fn run_list(cli: &Cli, settings: &Settings, pool: gacha::PoolCategory, limit: usize) -> Result<()> {
    let session = load_session(cli)?;
    let Some(uid) = session.cached_uid() else {
        bail!("No uid known yet; run `gachalog sync` first or pass --uid");
    };

    let store = open_store(cli, settings)?;
    let records = store.query(uid, pool, 0)?;
    let shown = &records[records.len().saturating_sub(limit)..];

    println!("{} pulls for UID {} ({} stored)", pool, uid, records.len());
    for record in shown.iter().rev() {
        let when = record
            .pulled_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| record.timestamp.to_string());
        println!("{}  pool {:>6}  item {:>8}", when, record.pool_id, record.item_id);
    }

    Ok(())
}

fn run_session(cli: &Cli, action: &SessionAction) -> Result<()> {
    match action {
        SessionAction::Set => {
            if cli.token.is_none() && cli.url.is_none() && cli.uid.is_none() {
                bail!("Nothing to save; pass --token, --url or --uid");
            }
            load_session(cli)?.save()?;
            println!("Session saved");
        }
        SessionAction::Show => {
            let session = SessionContext::load()?;
            println!("access token: {}", session.masked_token());
            println!("gacha url:    {}", session.gacha_url);
            println!("uid:          {}", session.cached_uid().unwrap_or("(unknown)"));
        }
    }
    Ok(())
}
