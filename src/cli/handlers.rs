// src/cli/handlers.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use super::args::{OutputFormat, ScanArgs};
use crate::analysis::Engine;
use crate::config::{self, AnalysisConfig, Config};
use crate::discovery;
use crate::encoder;
use crate::error::QtraceError;
use crate::exit::QtraceExit;
use crate::redteam::JsonlSink;
use crate::reporting::{self, FileReport, ScanSummary};
use crate::scanner::rules::RuleTable;
use crate::scanner::Scanner;

fn load_config(config_path: Option<&Path>, rules: Option<&Path>) -> crate::error::Result<Config> {
    let mut config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(path) = rules {
        config.rules = RuleTable::load(path)?;
    }
    Ok(config)
}

/// Reports a config problem as invalid input rather than a crash.
fn reject(err: &QtraceError) -> QtraceExit {
    eprintln!("{} {err}", "error:".red());
    QtraceExit::InvalidInput
}

/// Applies the command-line overrides on top of the loaded options.
#[must_use]
pub fn apply_overrides(mut analysis: AnalysisConfig, args: &ScanArgs) -> AnalysisConfig {
    if let Some(v) = args.max_qubits {
        analysis.max_qubits = v;
    }
    if let Some(v) = args.shots {
        analysis.shots = v;
    }
    if let Some(v) = args.max_pairwise_units {
        analysis.max_pairwise_units = v;
    }
    if let Some(v) = args.entanglement_threshold {
        analysis.entanglement_threshold = v;
    }
    if let Some(v) = args.exact_qubit_limit {
        analysis.exact_qubit_limit = v;
    }
    if let Some(v) = args.timeout_ms {
        analysis.timeout_ms = v;
    }
    if let Some(v) = args.seed {
        analysis.seed = v;
    }
    if args.red_team || args.red_team_out.is_some() {
        analysis.enable_red_team = true;
    }
    analysis
}

/// Handles the scan command.
///
/// # Errors
/// Returns error if a file cannot be read or the report cannot be rendered.
pub fn handle_scan(args: &ScanArgs, config_path: Option<&Path>) -> Result<QtraceExit> {
    let config = match load_config(config_path, args.rules.as_deref()) {
        Ok(c) => c,
        Err(e) => return Ok(reject(&e)),
    };
    let analysis = apply_overrides(config.analysis.clone(), args);
    if let Err(e) = analysis.validate() {
        return Ok(reject(&e));
    }
    if let Some(t) = args.fail_above {
        if !(0.0..=1.0).contains(&t) {
            eprintln!("{} --fail-above must be within [0, 1]", "error:".red());
            return Ok(QtraceExit::InvalidInput);
        }
    }

    let files = match discovery::discover(&args.path) {
        Ok(f) if f.is_empty() => {
            eprintln!(
                "{} no Python files under {}",
                "error:".red(),
                args.path.display()
            );
            return Ok(QtraceExit::InvalidInput);
        }
        Ok(f) => f,
        Err(e) => return Ok(reject(&e)),
    };

    let mut engine = Engine::from_config(&config);
    if let Some(out) = &args.red_team_out {
        engine = engine.with_red_team(Arc::new(JsonlSink::new(out)));
    }

    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        reports.push(analyze_file(&engine, path, &analysis)?);
    }
    let summary = ScanSummary::new(reports);

    match args.format {
        OutputFormat::Terminal => reporting::console::print_report(&summary)?,
        OutputFormat::Json => println!("{}", reporting::to_json(&summary)?),
        OutputFormat::Records => println!("{}", reporting::to_records_json(&summary)?),
    }

    match args.fail_above {
        Some(t) if summary.overall_risk > t => Ok(QtraceExit::RiskAboveThreshold),
        _ => Ok(QtraceExit::Success),
    }
}

fn analyze_file(engine: &Engine, path: PathBuf, analysis: &AnalysisConfig) -> Result<FileReport> {
    let source = config::io::read(&path)?;
    let report = engine
        .submit(&source, analysis)
        .with_context(|| format!("analyzing {}", path.display()))?;
    Ok(FileReport {
        path,
        source,
        report,
    })
}

/// Handles the circuits command.
///
/// # Errors
/// Returns error if the file cannot be read.
pub fn handle_circuits(
    file: &Path,
    rules: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<QtraceExit> {
    let config = match load_config(config_path, rules) {
        Ok(c) => c,
        Err(e) => return Ok(reject(&e)),
    };
    let source = config::io::read(file)?;
    let scan = Scanner::new(&config.rules).scan(&source);

    for unit in &scan.units {
        let spec = encoder::encode(unit);
        let fingerprint = spec.fingerprint();
        println!(
            "{} {} [{}] {} qubits, {} gates, {}",
            "==".blue(),
            unit.id.bold(),
            unit.tag,
            spec.qubit_count,
            spec.gates.len(),
            fingerprint.get(..12).unwrap_or(fingerprint.as_str()).dimmed()
        );
        println!("{}", spec.diagram());
    }
    for err in &scan.parse_errors {
        println!("{} {err}", "PARSE".red());
    }
    Ok(QtraceExit::Success)
}

/// Handles the rules command.
///
/// # Errors
/// Never fails once the config is loaded; bad config is invalid input.
pub fn handle_rules(toml: bool, config_path: Option<&Path>) -> Result<QtraceExit> {
    let config = match load_config(config_path, None) {
        Ok(c) => c,
        Err(e) => return Ok(reject(&e)),
    };
    if toml {
        print!("{}", config.rules.to_toml());
        return Ok(QtraceExit::Success);
    }
    for (i, rule) in config.rules.rules().iter().enumerate() {
        println!("{:2}. {rule}", i + 1);
    }
    Ok(QtraceExit::Success)
}
