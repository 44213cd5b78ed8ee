use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-request analysis options (the `[analysis]` table of `qtrace.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Ceiling on `CircuitSpec::qubit_count`; larger circuits overflow.
    #[serde(default = "default_max_qubits")]
    pub max_qubits: usize,
    /// Sample count for the sampled backend.
    #[serde(default = "default_shots")]
    pub shots: usize,
    /// Caps the number of correlation jobs per request.
    #[serde(default = "default_max_pairwise")]
    pub max_pairwise_units: usize,
    /// Forwards the taxonomy digest to the external red-team generator.
    #[serde(default)]
    pub enable_red_team: bool,
    /// Minimum correlation strength retained as an edge.
    #[serde(default = "default_threshold")]
    pub entanglement_threshold: f64,
    /// Circuits above this width are sampled instead of read exactly.
    #[serde(default = "default_exact_limit")]
    pub exact_qubit_limit: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Confidence removed from the report per skipped unit.
    #[serde(default = "default_penalty")]
    pub confidence_penalty: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_qubits: default_max_qubits(),
            shots: default_shots(),
            max_pairwise_units: default_max_pairwise(),
            enable_red_team: false,
            entanglement_threshold: default_threshold(),
            exact_qubit_limit: default_exact_limit(),
            timeout_ms: default_timeout_ms(),
            seed: default_seed(),
            confidence_penalty: default_penalty(),
        }
    }
}

impl AnalysisConfig {
    #[must_use]
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

const fn default_max_qubits() -> usize { 20 }
const fn default_shots() -> usize { 1024 }
const fn default_max_pairwise() -> usize { 64 }
const fn default_threshold() -> f64 { 0.3 }
const fn default_exact_limit() -> usize { 12 }
const fn default_timeout_ms() -> u64 { 2000 }
const fn default_seed() -> u64 { 0x5eed_c0de }
const fn default_penalty() -> f64 { 0.15 }

/// Coefficients of the per-unit risk formula and the overall aggregate.
///
/// Per-tag weights come from the rule table; `benign` covers units no rule
/// matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    #[serde(default = "default_benign")]
    pub benign: f64,
    #[serde(default = "default_base")]
    pub base: f64,
    #[serde(default = "default_entropy")]
    pub entropy: f64,
    #[serde(default = "default_balance")]
    pub balance: f64,
    #[serde(default)]
    pub overall: OverallWeights,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            benign: default_benign(),
            base: default_base(),
            entropy: default_entropy(),
            balance: default_balance(),
            overall: OverallWeights::default(),
        }
    }
}

const fn default_benign() -> f64 { 0.1 }
const fn default_base() -> f64 { 0.6 }
const fn default_entropy() -> f64 { 0.25 }
const fn default_balance() -> f64 { 0.15 }

/// Mix of mean unit risk, peak unit risk and correlation strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallWeights {
    #[serde(default = "default_mean")]
    pub mean: f64,
    #[serde(default = "default_peak")]
    pub peak: f64,
    #[serde(default = "default_correlation")]
    pub correlation: f64,
}

impl Default for OverallWeights {
    fn default() -> Self {
        Self {
            mean: default_mean(),
            peak: default_peak(),
            correlation: default_correlation(),
        }
    }
}

const fn default_mean() -> f64 { 0.4 }
const fn default_peak() -> f64 { 0.5 }
const fn default_correlation() -> f64 { 0.1 }

/// On-disk shape of `qtrace.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QtraceToml {
    /// Optional rule-table file, relative to the config file.
    #[serde(default)]
    pub rules: Option<PathBuf>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub weights: WeightConfig,
}
