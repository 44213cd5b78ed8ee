pub mod analysis;
pub mod circuit;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod encoder;
pub mod error;
pub mod exit;
pub mod graph;
pub mod logging;
pub mod redteam;
pub mod report;
pub mod reporting;
pub mod risk;
pub mod scanner;
pub mod simulator;
pub mod types;

use std::sync::OnceLock;

pub use analysis::Engine;
pub use config::AnalysisConfig;
pub use error::{QtraceError, Result};
pub use report::AnalysisReport;

static DEFAULT_ENGINE: OnceLock<Engine> = OnceLock::new();

/// Analyzes `source` with the default rule and weight tables.
///
/// # Errors
/// Returns `Config` if `config` is out of range.
pub fn submit(source: &str, config: &AnalysisConfig) -> Result<AnalysisReport> {
    DEFAULT_ENGINE.get_or_init(Engine::default).submit(source, config)
}
