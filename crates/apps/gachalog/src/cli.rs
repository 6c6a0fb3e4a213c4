//! Command-line definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gacha::PoolCategory;

#[derive(Parser)]
#[command(name = "gachalog")]
#[command(about = "Keep a local copy of your gacha pull history")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Record database (overrides settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Access token for this run (overrides the saved session)
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Gacha record endpoint for this run (overrides the saved session)
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Account uid (overrides the saved session)
    #[arg(long, global = true)]
    pub uid: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch new pulls from the game service
    Sync {
        /// Refetch the whole history and rebuild each pool (takes a backup first)
        #[arg(long)]
        full: bool,
    },
    /// Show stored pulls for a pool
    List {
        /// Pool name (standard, targeted, armory, beginner, mystery-box) or id
        #[arg(short, long)]
        pool: PoolCategory,
        /// Number of most recent pulls to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show or change the saved session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Back up the record database now
    Backup,
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Save the --token, --url and --uid values to session.json
    Set,
    /// Print the saved session with the token masked
    Show,
}
