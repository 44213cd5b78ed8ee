// src/simulator/statevector.rs
//! Real-amplitude statevector. Qubit `q` is bit `q` of the basis index.

use crate::circuit::Gate;

#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    amps: Vec<f64>,
}

impl StateVector {
    /// `|0…0⟩` on `qubits` qubits. Callers bound `qubits` before allocating.
    #[must_use]
    pub fn zero(qubits: usize) -> Self {
        let mut amps = vec![0.0; 1usize << qubits];
        amps[0] = 1.0;
        Self { amps }
    }

    /// Gate qubits must lie below the width passed to [`Self::zero`].
    pub fn apply(&mut self, gate: &Gate) {
        match *gate {
            Gate::X { target } => self.pairs(None, target, |a, b| (b, a)),
            Gate::H { target } => {
                let r = std::f64::consts::FRAC_1_SQRT_2;
                self.pairs(None, target, |a, b| (r * (a + b), r * (a - b)));
            }
            Gate::Ry { target, theta } => {
                let (s, c) = (theta / 2.0).sin_cos();
                self.pairs(None, target, |a, b| (c * a - s * b, s * a + c * b));
            }
            Gate::Cnot { control, target } => self.pairs(Some(control), target, |a, b| (b, a)),
            Gate::Cry {
                control,
                target,
                theta,
            } => {
                let (s, c) = (theta / 2.0).sin_cos();
                self.pairs(Some(control), target, |a, b| (c * a - s * b, s * a + c * b));
            }
        }
    }

    /// Applies a 2x2 real map to every amplitude pair differing in `target`,
    /// restricted to indices whose `control` bit is set.
    fn pairs(&mut self, control: Option<usize>, target: usize, map: impl Fn(f64, f64) -> (f64, f64)) {
        let bit = 1usize << target;
        let mask = control.map_or(0, |c| 1usize << c);
        for i in 0..self.amps.len() {
            if i & bit != 0 || i & mask != mask {
                continue;
            }
            let j = i | bit;
            let (a, b) = map(self.amps[i], self.amps[j]);
            self.amps[i] = a;
            self.amps[j] = b;
        }
    }

    /// Born-rule probabilities indexed by basis state.
    #[must_use]
    pub fn probabilities(&self) -> Vec<f64> {
        self.amps.iter().map(|a| a * a).collect()
    }
}

/// Renders basis index `index` with qubit 0 as the first character.
#[must_use]
pub fn bitstring(index: usize, qubits: usize) -> String {
    (0..qubits)
        .map(|q| if (index >> q) & 1 == 1 { '1' } else { '0' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn x_flips_the_target() {
        let mut sv = StateVector::zero(2);
        sv.apply(&Gate::X { target: 1 });
        let p = sv.probabilities();
        assert!(close(p[0b10], 1.0));
    }

    #[test]
    fn ry_pi_over_two_balances_a_qubit() {
        let mut sv = StateVector::zero(1);
        sv.apply(&Gate::Ry {
            target: 0,
            theta: FRAC_PI_2,
        });
        let p = sv.probabilities();
        assert!(close(p[0], 0.5) && close(p[1], 0.5));
    }

    #[test]
    fn hadamard_then_cnot_makes_a_bell_pair() {
        let mut sv = StateVector::zero(2);
        sv.apply(&Gate::H { target: 0 });
        sv.apply(&Gate::Cnot {
            control: 0,
            target: 1,
        });
        let p = sv.probabilities();
        assert!(close(p[0b00], 0.5));
        assert!(close(p[0b11], 0.5));
        assert!(close(p[0b01] + p[0b10], 0.0));
    }

    #[test]
    fn controlled_rotation_waits_for_control() {
        let mut sv = StateVector::zero(2);
        sv.apply(&Gate::Cry {
            control: 0,
            target: 1,
            theta: PI,
        });
        assert!(close(sv.probabilities()[0], 1.0));
        sv.apply(&Gate::X { target: 0 });
        sv.apply(&Gate::Cry {
            control: 0,
            target: 1,
            theta: PI,
        });
        assert!(close(sv.probabilities()[0b11], 1.0));
    }

    #[test]
    fn bitstrings_put_qubit_zero_first() {
        assert_eq!(bitstring(0b001, 3), "100");
        assert_eq!(bitstring(0b110, 3), "011");
        assert_eq!(bitstring(0, 0), "");
    }
}
