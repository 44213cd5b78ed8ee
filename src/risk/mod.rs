// src/risk/mod.rs
//! Turns simulated distributions into calibrated risk scores.

pub mod correlation;
pub mod overall;
pub mod weights;

use serde::{Deserialize, Serialize};

use crate::simulator::{Backend, SimulationResult};
use crate::types::RiskLevel;
pub use weights::WeightTable;

/// One named term of the per-unit formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub name: String,
    pub weight: f64,
    pub value: f64,
    /// `tag_weight * weight * value`; the contributions sum to the
    /// unclamped score.
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub value: f64,
    pub confidence: f64,
    pub level: RiskLevel,
    pub contributing_factors: Vec<Factor>,
}

impl RiskScore {
    /// Sum of factor contributions before clamping.
    #[must_use]
    pub fn raw(&self) -> f64 {
        self.contributing_factors.iter().map(|f| f.contribution).sum()
    }
}

#[must_use]
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Confidence of a backend: exact readouts are certain, sampled ones carry
/// `1/sqrt(shots)` of sampling error.
#[must_use]
pub fn backend_confidence(backend: Backend) -> f64 {
    match backend {
        Backend::Exact => 1.0,
        Backend::Sampled { shots } => clamp01(1.0 - 1.0 / (shots.max(1) as f64).sqrt()),
    }
}

/// Scores one unit. Pure: the same result and table give the same score.
#[must_use]
pub fn score(result: &SimulationResult, weights: &WeightTable) -> RiskScore {
    let k = result.qubit_count.saturating_sub(result.taxonomy_bits);
    let entropy_norm = if k == 0 {
        0.0
    } else {
        clamp01(result.entropy / k as f64)
    };
    let states = 2f64.powi(i32::try_from(k).unwrap_or(i32::MAX));
    let skew = if states <= 1.0 {
        1.0
    } else {
        let uniform = 1.0 / states;
        clamp01((result.dominant_probability - uniform) / (1.0 - uniform))
    };
    let balance = 1.0 - skew;

    let w_tag = weights.tag_weight(result.tag);
    let factor = |name: &str, weight: f64, value: f64| Factor {
        name: name.to_string(),
        weight,
        value,
        contribution: w_tag * weight * value,
    };
    let contributing_factors = vec![
        factor("base", weights.base, 1.0),
        factor("entropy", weights.entropy, entropy_norm),
        factor("balance", weights.balance, balance),
    ];
    let value = clamp01(contributing_factors.iter().map(|f| f.contribution).sum());

    RiskScore {
        value,
        confidence: backend_confidence(result.backend),
        level: RiskLevel::from_score(value),
        contributing_factors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder;
    use crate::simulator::{SimulatorPort, StatevectorSimulator};
    use crate::types::{CodeUnit, Complexity, Tag};

    fn simulate(tag: Tag, branches: usize, boolean_ops: usize) -> SimulationResult {
        let unit = CodeUnit::synthetic(
            "u",
            tag,
            Complexity {
                branches,
                boolean_ops,
                max_depth: 1,
            },
        );
        let sim = StatevectorSimulator::from_config(&crate::config::AnalysisConfig::default());
        sim.run(&encoder::encode(&unit))
            .unwrap_or_else(|e| panic!("simulation failed: {e}"))
    }

    #[test]
    fn date_bomb_scores_above_seven_tenths() {
        let score = score(&simulate(Tag::ProbabilisticBomb, 1, 0), &WeightTable::default());
        assert!((score.value - 0.754).abs() < 0.002, "value {}", score.value);
        assert_eq!(score.level, RiskLevel::Extreme);
        assert_eq!(score.confidence, 1.0);
        assert!((score.raw() - score.value).abs() < 1e-12);
    }

    #[test]
    fn branchless_units_score_only_the_base() {
        let score = score(&simulate(Tag::Benign, 0, 0), &WeightTable::default());
        assert!((score.value - 0.1 * 0.6).abs() < 1e-12);
        assert_eq!(score.level, RiskLevel::Safe);
    }

    #[test]
    fn rescoring_is_idempotent() {
        let result = simulate(Tag::Steganography, 3, 2);
        let weights = WeightTable::default();
        assert_eq!(score(&result, &weights), score(&result, &weights));
    }

    #[test]
    fn sampled_confidence_shrinks_with_fewer_shots() {
        assert_eq!(backend_confidence(Backend::Exact), 1.0);
        let few = backend_confidence(Backend::Sampled { shots: 16 });
        let many = backend_confidence(Backend::Sampled { shots: 1024 });
        assert!((few - 0.75).abs() < 1e-12);
        assert!(many > few);
    }
}
