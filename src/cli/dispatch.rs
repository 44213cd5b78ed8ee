//! Command dispatch logic extracted from binary to reduce main function size.

use std::path::Path;

use anyhow::Result;

use super::args::Commands;
use super::handlers::{handle_circuits, handle_rules, handle_scan};
use crate::exit::QtraceExit;

/// Executes the parsed command.
///
/// # Errors
/// Returns error if the command handler fails.
pub fn execute(command: Commands, config_path: Option<&Path>) -> Result<QtraceExit> {
    match command {
        Commands::Scan(args) => handle_scan(&args, config_path),
        Commands::Circuits { file, rules } => handle_circuits(&file, rules.as_deref(), config_path),
        Commands::Rules { toml } => handle_rules(toml, config_path),
    }
}
