//! CLI argument parsing for the admin tool.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// Feedhub store administration
///
/// Inspects and repairs a feedhub store. The store must not be open in
/// another process.
#[derive(Parser, Debug)]
#[command(name = "feedhub-admin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/feedhub/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: AdminCommands,
}

/// Admin subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AdminCommands {
    /// Show record and index counts per entity
    Stats,

    /// Check every secondary index against its records
    Verify {
        /// Rebuild the indexes if any inconsistency is found
        #[arg(long)]
        repair: bool,

        /// Maximum number of issues to list
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Drop and re-derive every secondary index
    RebuildIndexes,

    /// Remove records whose parent records no longer exist
    PurgeOrphans,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_stats() {
        let cli = Cli::parse_from(["feedhub-admin", "stats"]);
        assert_eq!(cli.command, AdminCommands::Stats);
    }

    #[test]
    fn test_cli_verify_defaults() {
        let cli = Cli::parse_from(["feedhub-admin", "verify"]);
        assert_eq!(
            cli.command,
            AdminCommands::Verify {
                repair: false,
                limit: 20
            }
        );
    }

    #[test]
    fn test_cli_verify_repair() {
        let cli = Cli::parse_from(["feedhub-admin", "verify", "--repair", "--limit", "5"]);
        match cli.command {
            AdminCommands::Verify { repair, limit } => {
                assert!(repair);
                assert_eq!(limit, 5);
            }
            _ => panic!("Expected Verify command"),
        }
    }

    #[test]
    fn test_cli_rebuild_and_purge() {
        let cli = Cli::parse_from(["feedhub-admin", "rebuild-indexes"]);
        assert_eq!(cli.command, AdminCommands::RebuildIndexes);

        let cli = Cli::parse_from(["feedhub-admin", "purge-orphans"]);
        assert_eq!(cli.command, AdminCommands::PurgeOrphans);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "feedhub-admin",
            "stats",
            "--db-path",
            "/custom/db",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.db_path, Some("/custom/db".to_string()));
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["feedhub-admin", "--config", "/path/to/config.toml", "stats"]);
        assert_eq!(cli.config, Some("/path/to/config.toml".to_string()));
    }
}
