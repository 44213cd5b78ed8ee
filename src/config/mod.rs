// src/config/mod.rs
pub mod io;
pub mod types;

pub use self::types::{AnalysisConfig, OverallWeights, QtraceToml, WeightConfig};

use std::path::Path;

use crate::error::{QtraceError, Result};
use crate::scanner::rules::RuleTable;

/// Name of the project config file looked up in the working directory.
pub const CONFIG_FILE: &str = "qtrace.toml";

/// Everything loaded once at startup. Immutable afterwards and passed by
/// reference into each request.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub weights: WeightConfig,
    pub rules: RuleTable,
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `qtrace.toml` from the working directory if present.
    ///
    /// # Errors
    /// Returns an error if the file exists but is malformed or invalid.
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::new())
        }
    }

    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = io::read(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse_toml(&content, base)
    }

    /// Parses config text; a relative `rules` path resolves against `base_dir`.
    ///
    /// # Errors
    /// Returns `Toml` for malformed input and `Config` for invalid values.
    pub fn parse_toml(content: &str, base_dir: &Path) -> Result<Self> {
        let raw: QtraceToml = toml::from_str(content)?;
        let rules = match &raw.rules {
            Some(rel) => RuleTable::load(&base_dir.join(rel))?,
            None => RuleTable::default(),
        };
        let config = Self {
            analysis: raw.analysis,
            weights: raw.weights,
            rules,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration ranges.
    ///
    /// # Errors
    /// Returns `Config` naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.weights.validate()?;
        if self.rules.is_empty() {
            return Err(QtraceError::config("rule table is empty"));
        }
        Ok(())
    }
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(QtraceError::config(format!("{name} must be within [0, 1], got {value}")))
    }
}

impl AnalysisConfig {
    /// # Errors
    /// Returns `Config` for zero-sized budgets or out-of-range fractions.
    pub fn validate(&self) -> Result<()> {
        if self.max_qubits == 0 || self.max_qubits > 30 {
            return Err(QtraceError::config(format!(
                "max_qubits must be within 1..=30, got {}",
                self.max_qubits
            )));
        }
        if self.shots == 0 {
            return Err(QtraceError::config("shots must be positive"));
        }
        if self.exact_qubit_limit > self.max_qubits {
            return Err(QtraceError::config(format!(
                "exact_qubit_limit ({}) exceeds max_qubits ({})",
                self.exact_qubit_limit, self.max_qubits
            )));
        }
        unit_interval("entanglement_threshold", self.entanglement_threshold)?;
        unit_interval("confidence_penalty", self.confidence_penalty)
    }
}

impl WeightConfig {
    /// # Errors
    /// Returns `Config` if any coefficient leaves `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        unit_interval("weights.benign", self.benign)?;
        unit_interval("weights.base", self.base)?;
        unit_interval("weights.entropy", self.entropy)?;
        unit_interval("weights.balance", self.balance)?;
        unit_interval("weights.overall.mean", self.overall.mean)?;
        unit_interval("weights.overall.peak", self.overall.peak)?;
        unit_interval("weights.overall.correlation", self.overall.correlation)
    }
}
