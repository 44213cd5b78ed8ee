// src/encoder.rs
//! Deterministic `CodeUnit -> CircuitSpec` synthesis.
//!
//! Branch qubits hold the unit's control-flow shape, taxonomy qubits spell
//! its tag. Nothing here depends on configuration or time, so the same unit
//! always yields the same bytes.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::circuit::{CircuitSpec, Gate, MeasurementBasis, Register};
use crate::types::{CodeUnit, Tag};

/// Bumped whenever the gate walk changes.
pub const ENCODER_VERSION: u32 = 1;

/// Qubits reserved for the taxonomy code (six tags fit in three bits).
pub const TAXONOMY_BITS: usize = 3;

/// `ceil(log2(branches + 1))`, i.e. the bit length of `branches`.
#[must_use]
pub fn branch_qubits(branches: usize) -> usize {
    (usize::BITS - branches.leading_zeros()) as usize
}

/// `(π/2)(1 − 2^−(b+1))`: π/4 with no boolean operators, tending to π/2.
#[must_use]
pub fn rotation_angle(boolean_ops: usize) -> f64 {
    let exponent = i32::try_from(boolean_ops.saturating_add(1)).unwrap_or(i32::MAX);
    FRAC_PI_2 * (1.0 - 2f64.powi(-exponent))
}

/// Encodes one unit.
#[must_use]
pub fn encode(unit: &CodeUnit) -> CircuitSpec {
    let k = branch_qubits(unit.complexity.branches);
    let mut gates = Vec::new();
    push_unit_gates(unit, 0, &mut gates);
    CircuitSpec {
        encoder_version: ENCODER_VERSION,
        tag: unit.tag,
        qubit_count: k + TAXONOMY_BITS,
        gates,
        measurement: MeasurementBasis {
            registers: vec![
                Register {
                    name: "branch".into(),
                    qubits: (0..k).collect(),
                },
                Register {
                    name: "taxonomy".into(),
                    qubits: (k..k + TAXONOMY_BITS).collect(),
                },
            ],
        },
    }
}

fn push_unit_gates(unit: &CodeUnit, offset: usize, gates: &mut Vec<Gate>) {
    let k = branch_qubits(unit.complexity.branches);
    let theta = rotation_angle(unit.complexity.boolean_ops);
    for q in 0..k {
        gates.push(Gate::Ry {
            target: offset + q,
            theta,
        });
    }
    for q in 1..k.min(unit.complexity.max_depth) {
        gates.push(Gate::Cnot {
            control: offset + q - 1,
            target: offset + q,
        });
    }
    let code = unit.tag.code();
    for bit in 0..TAXONOMY_BITS {
        if (code >> bit) & 1 == 1 {
            gates.push(Gate::X {
                target: offset + k + bit,
            });
        }
    }
}

/// How strongly two related units are coupled in their joint circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coupling {
    /// Both units write the same object.
    Lockstep,
    /// One writes what the other reads.
    WriterReader,
    /// Only a call relationship.
    Call,
}

impl Coupling {
    #[must_use]
    pub fn strength(self) -> f64 {
        match self {
            Self::Lockstep => 1.0,
            Self::WriterReader => 2.0 / 3.0,
            Self::Call => 0.4,
        }
    }

    /// Strongest relationship between two units, if they are related at all.
    #[must_use]
    pub fn between(a: &CodeUnit, b: &CodeUnit) -> Option<Self> {
        if a.state_writes.intersection(&b.state_writes).next().is_some() {
            return Some(Self::Lockstep);
        }
        let feeds = |w: &CodeUnit, r: &CodeUnit| w.state_writes.iter().any(|o| r.state_reads.contains(o));
        if feeds(a, b) || feeds(b, a) {
            return Some(Self::WriterReader);
        }
        if a.calls.contains(&b.id) || b.calls.contains(&a.id) {
            return Some(Self::Call);
        }
        None
    }
}

/// Encodes a related pair. The pair is ordered by id first, so
/// `encode_pair(a, b) == encode_pair(b, a)`.
///
/// Layout: A's qubits, A's link, B's qubits, B's link. Register `a` covers A
/// and its link, register `b` covers B and its link.
#[must_use]
pub fn encode_pair(a: &CodeUnit, b: &CodeUnit, coupling: Coupling) -> CircuitSpec {
    let (a, b) = if a.id <= b.id { (a, b) } else { (b, a) };
    let width_a = branch_qubits(a.complexity.branches) + TAXONOMY_BITS;
    let width_b = branch_qubits(b.complexity.branches) + TAXONOMY_BITS;
    let link_a = width_a;
    let offset_b = width_a + 1;
    let link_b = offset_b + width_b;

    let mut gates = Vec::new();
    push_unit_gates(a, 0, &mut gates);
    push_unit_gates(b, offset_b, &mut gates);

    let phi = coupling.strength() * FRAC_PI_2;
    gates.push(Gate::Ry {
        target: link_a,
        theta: phi,
    });
    gates.push(Gate::Cnot {
        control: link_a,
        target: link_b,
    });
    let shared = branch_qubits(a.complexity.branches).min(branch_qubits(b.complexity.branches));
    for q in 0..shared {
        gates.push(Gate::Cry {
            control: q,
            target: offset_b + q,
            theta: phi,
        });
    }

    CircuitSpec {
        encoder_version: ENCODER_VERSION,
        tag: pair_tag(a.tag, b.tag),
        qubit_count: link_b + 1,
        gates,
        measurement: MeasurementBasis {
            registers: vec![
                Register {
                    name: "a".into(),
                    qubits: (0..=link_a).collect(),
                },
                Register {
                    name: "b".into(),
                    qubits: (offset_b..=link_b).collect(),
                },
            ],
        },
    }
}

/// The joint circuit carries the more severe tag of the two (higher code).
fn pair_tag(a: Tag, b: Tag) -> Tag {
    if b.code() > a.code() {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Complexity;
    use std::f64::consts::FRAC_PI_4;

    fn unit(id: &str, tag: Tag, branches: usize, boolean_ops: usize, max_depth: usize) -> CodeUnit {
        CodeUnit::synthetic(
            id,
            tag,
            Complexity {
                branches,
                boolean_ops,
                max_depth,
            },
        )
    }

    #[test]
    fn qubit_budget_follows_branch_bits() {
        assert_eq!(branch_qubits(0), 0);
        assert_eq!(branch_qubits(1), 1);
        assert_eq!(branch_qubits(3), 2);
        assert_eq!(branch_qubits(4), 3);
        assert_eq!(branch_qubits(1 << 26), 27);
        let spec = encode(&unit("f", Tag::Benign, 1 << 26, 0, 1));
        assert_eq!(spec.qubit_count, 30);
    }

    #[test]
    fn angle_starts_at_quarter_turn() {
        assert!((rotation_angle(0) - FRAC_PI_4).abs() < 1e-12);
        assert!(rotation_angle(1) > rotation_angle(0));
        assert!(rotation_angle(200) <= FRAC_PI_2);
    }

    #[test]
    fn taxonomy_qubits_spell_the_tag() {
        let spec = encode(&unit("f", Tag::AntiDebug, 1, 0, 1));
        let xs: Vec<usize> = spec
            .gates
            .iter()
            .filter_map(|g| match g {
                Gate::X { target } => Some(*target),
                _ => None,
            })
            .collect();
        // AntiDebug = 5 = 0b101, taxonomy qubits start at 1.
        assert_eq!(xs, vec![1, 3]);
    }

    #[test]
    fn nesting_adds_cnot_chain() {
        let spec = encode(&unit("f", Tag::ChainedLogic, 7, 2, 3));
        let cnots = spec
            .gates
            .iter()
            .filter(|g| matches!(g, Gate::Cnot { .. }))
            .count();
        assert_eq!(cnots, 2);
    }

    #[test]
    fn encoding_is_reproducible() {
        let u = unit("f", Tag::Steganography, 5, 3, 2);
        assert_eq!(encode(&u).canonical_bytes(), encode(&u).canonical_bytes());
    }

    #[test]
    fn pair_encoding_is_order_independent() {
        let a = unit("alpha", Tag::Entanglement, 2, 1, 1);
        let b = unit("beta", Tag::Benign, 1, 0, 1);
        let ab = encode_pair(&a, &b, Coupling::Lockstep);
        let ba = encode_pair(&b, &a, Coupling::Lockstep);
        assert_eq!(ab, ba);
        assert_eq!(ab.qubit_count, (2 + 3 + 1) + (1 + 3 + 1));
        assert_eq!(ab.tag, Tag::Entanglement);
        let a_reg = ab.measurement.register("a").map(|r| r.qubits.len());
        assert_eq!(a_reg, Some(6));
    }

    #[test]
    fn coupling_prefers_shared_writes() {
        let mut a = unit("a", Tag::Benign, 0, 0, 0);
        let mut b = unit("b", Tag::Benign, 0, 0, 0);
        assert_eq!(Coupling::between(&a, &b), None);
        a.calls.insert("b".into());
        assert_eq!(Coupling::between(&a, &b), Some(Coupling::Call));
        a.state_writes.insert("counter".into());
        b.state_reads.insert("counter".into());
        assert_eq!(Coupling::between(&a, &b), Some(Coupling::WriterReader));
        b.state_writes.insert("counter".into());
        assert_eq!(Coupling::between(&b, &a), Some(Coupling::Lockstep));
    }
}
