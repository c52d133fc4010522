//! Feedhub admin library exports.
//!
//! This crate provides the maintenance binary for the feedhub store.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (stats, verify, rebuild, purge)

pub mod cli;
pub mod commands;

pub use cli::{AdminCommands, Cli};
pub use commands::{handle_command, init_logging, load_settings, open_database};
