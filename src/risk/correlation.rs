// src/risk/correlation.rs
//! Joint-versus-marginal comparison for related unit pairs.

use serde::{Deserialize, Serialize};

use crate::circuit::CircuitSpec;
use crate::encoder::Coupling;
use crate::simulator::{shannon_entropy, SimulationResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEdge {
    /// Lexicographically smaller id.
    pub unit_a: String,
    pub unit_b: String,
    pub coupling: Coupling,
    /// Bits of information shared between the two registers.
    pub mutual_information: f64,
    /// `1 - 2^-MI`, in `[0, 1)`.
    pub strength: f64,
}

impl CorrelationEdge {
    #[must_use]
    pub fn involves(&self, id: &str) -> bool {
        self.unit_a == id || self.unit_b == id
    }

    #[must_use]
    pub fn other(&self, id: &str) -> Option<&str> {
        if self.unit_a == id {
            Some(&self.unit_b)
        } else if self.unit_b == id {
            Some(&self.unit_a)
        } else {
            None
        }
    }
}

/// `H(A) + H(B) - H(A,B)` over the `a` and `b` registers, clamped at zero.
#[must_use]
pub fn mutual_information(spec: &CircuitSpec, joint: &SimulationResult) -> f64 {
    let (Some(a), Some(b)) = (spec.measurement.register("a"), spec.measurement.register("b"))
    else {
        return 0.0;
    };
    let h_a = shannon_entropy(joint.marginal(&a.qubits).into_values());
    let h_b = shannon_entropy(joint.marginal(&b.qubits).into_values());
    let both: Vec<usize> = a.qubits.iter().chain(&b.qubits).copied().collect();
    let h_ab = shannon_entropy(joint.marginal(&both).into_values());
    (h_a + h_b - h_ab).max(0.0)
}

#[must_use]
pub fn strength(mutual_information: f64) -> f64 {
    1.0 - (-mutual_information).exp2()
}

/// Builds the edge for an already simulated joint circuit.
#[must_use]
pub fn edge(
    id_a: &str,
    id_b: &str,
    coupling: Coupling,
    spec: &CircuitSpec,
    joint: &SimulationResult,
) -> CorrelationEdge {
    let (unit_a, unit_b) = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };
    let mi = mutual_information(spec, joint);
    CorrelationEdge {
        unit_a: unit_a.to_string(),
        unit_b: unit_b.to_string(),
        coupling,
        mutual_information: mi,
        strength: strength(mi),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_pair;
    use crate::simulator::{SimulatorPort, StatevectorSimulator};
    use crate::types::{CodeUnit, Complexity, Tag};

    fn unit(id: &str, branches: usize) -> CodeUnit {
        CodeUnit::synthetic(
            id,
            Tag::Entanglement,
            Complexity {
                branches,
                boolean_ops: 0,
                max_depth: 1,
            },
        )
    }

    fn correlate(a: &CodeUnit, b: &CodeUnit, coupling: Coupling) -> CorrelationEdge {
        let spec = encode_pair(a, b, coupling);
        let sim = StatevectorSimulator::from_config(&crate::config::AnalysisConfig::default());
        let joint = sim
            .run(&spec)
            .unwrap_or_else(|e| panic!("simulation failed: {e}"));
        edge(&a.id, &b.id, coupling, &spec, &joint)
    }

    #[test]
    fn lockstep_writers_share_one_bit() {
        let e = correlate(&unit("inc_a", 0), &unit("inc_b", 0), Coupling::Lockstep);
        assert!((e.mutual_information - 1.0).abs() < 1e-9);
        assert!((e.strength - 0.5).abs() < 1e-9);
    }

    #[test]
    fn weaker_couplings_share_less() {
        let a = unit("a", 1);
        let b = unit("b", 1);
        let lockstep = correlate(&a, &b, Coupling::Lockstep).strength;
        let reader = correlate(&a, &b, Coupling::WriterReader).strength;
        let call = correlate(&a, &b, Coupling::Call).strength;
        assert!(lockstep > reader && reader > call && call > 0.0);
    }

    #[test]
    fn edges_are_symmetric() {
        let a = unit("alpha", 2);
        let b = unit("beta", 1);
        let ab = correlate(&a, &b, Coupling::WriterReader);
        let ba = correlate(&b, &a, Coupling::WriterReader);
        assert_eq!(ab, ba);
        assert_eq!(ab.unit_a, "alpha");
        assert_eq!(ab.other("alpha"), Some("beta"));
    }

    #[test]
    fn strength_is_bounded() {
        assert_eq!(strength(0.0), 0.0);
        assert!(strength(40.0) <= 1.0);
    }
}
