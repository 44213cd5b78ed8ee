use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "qtrace",
    version,
    about = "Quantum-style risk analysis of adversarial logic in Python source"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Config file to use instead of ./qtrace.toml
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a Python file or every *.py under a directory
    Scan(ScanArgs),
    /// Print the circuit synthesized for each unit of a file
    Circuits {
        file: PathBuf,
        /// Rule table to classify with
        #[arg(long, value_name = "FILE")]
        rules: Option<PathBuf>,
    },
    /// Print the active rule table
    Rules {
        /// Emit the table in rule-file TOML
        #[arg(long)]
        toml: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
    Records,
}

#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    pub path: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Terminal)]
    pub format: OutputFormat,
    /// Rule table file (overrides `rules` in qtrace.toml)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,
    /// Exit with code 3 when the overall risk exceeds this value
    #[arg(long, value_name = "RISK")]
    pub fail_above: Option<f64>,
    #[arg(long)]
    pub max_qubits: Option<usize>,
    #[arg(long)]
    pub shots: Option<usize>,
    #[arg(long)]
    pub max_pairwise_units: Option<usize>,
    #[arg(long)]
    pub entanglement_threshold: Option<f64>,
    #[arg(long)]
    pub exact_qubit_limit: Option<usize>,
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Attach the taxonomy digest to each report
    #[arg(long)]
    pub red_team: bool,
    /// Append taxonomy digests to this JSONL file (implies --red-team)
    #[arg(long, value_name = "FILE")]
    pub red_team_out: Option<PathBuf>,
}
