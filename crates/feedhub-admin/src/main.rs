//! Feedhub Admin
//!
//! Offline maintenance for a feedhub store.
//!
//! # Usage
//!
//! ```bash
//! feedhub-admin stats [--db-path PATH]
//! feedhub-admin verify [--repair] [--limit N]
//! feedhub-admin rebuild-indexes
//! feedhub-admin purge-orphans
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/feedhub/config.toml)
//! 3. Environment variables (FEEDHUB_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;
use tracing::info;

use feedhub_admin::{handle_command, init_logging, load_settings, open_database, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(
        cli.config.as_deref(),
        cli.db_path.as_deref(),
        cli.log_level.as_deref(),
    )?;
    init_logging(&settings)?;
    info!(db_path = %settings.db_path, command = ?cli.command, "feedhub-admin starting");

    let db = open_database(&settings)?;
    let mut stdout = std::io::stdout().lock();
    handle_command(&db, cli.command, &mut stdout)?;
    db.close();

    Ok(())
}
