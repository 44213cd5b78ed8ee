// src/circuit.rs
//! Gate-level circuit description shared by the encoder and the simulator.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::Tag;

/// The closed gate set. Every gate is real-valued, so amplitudes stay real.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gate", rename_all = "lowercase")]
pub enum Gate {
    X { target: usize },
    H { target: usize },
    Ry { target: usize, theta: f64 },
    Cnot { control: usize, target: usize },
    Cry { control: usize, target: usize, theta: f64 },
}

impl Gate {
    /// Highest qubit index the gate touches.
    #[must_use]
    pub fn max_qubit(&self) -> usize {
        match *self {
            Self::X { target } | Self::H { target } | Self::Ry { target, .. } => target,
            Self::Cnot { control, target } | Self::Cry { control, target, .. } => {
                control.max(target)
            }
        }
    }

    fn cell(&self, qubit: usize) -> Option<String> {
        match *self {
            Self::X { target } if target == qubit => Some("X".into()),
            Self::H { target } if target == qubit => Some("H".into()),
            Self::Ry { target, theta } if target == qubit => Some(format!("Ry({theta:.3})")),
            Self::Cnot { control, .. } | Self::Cry { control, .. } if control == qubit => {
                Some("●".into())
            }
            Self::Cnot { target, .. } if target == qubit => Some("⊕".into()),
            Self::Cry { target, theta, .. } if target == qubit => Some(format!("Ry({theta:.3})")),
            Self::Cnot { control, target } | Self::Cry { control, target, .. }
                if (control.min(target)..control.max(target)).contains(&qubit) =>
            {
                Some("│".into())
            }
            _ => None,
        }
    }
}

/// A named group of qubits read together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    pub name: String,
    pub qubits: Vec<usize>,
}

/// Computational-basis measurement over ordered registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementBasis {
    pub registers: Vec<Register>,
}

impl MeasurementBasis {
    #[must_use]
    pub fn register(&self, name: &str) -> Option<&Register> {
        self.registers.iter().find(|r| r.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSpec {
    pub encoder_version: u32,
    pub tag: Tag,
    pub qubit_count: usize,
    pub gates: Vec<Gate>,
    pub measurement: MeasurementBasis,
}

impl CircuitSpec {
    /// Canonical serialized form; the struct has no maps, so field order is fixed.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Serializing plain structs of numbers and strings cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Hex SHA-256 of [`Self::canonical_bytes`].
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.canonical_bytes());
        digest.iter().fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
    }

    /// First eight digest bytes, used to derive per-circuit RNG streams.
    #[must_use]
    pub fn fingerprint_seed(&self) -> u64 {
        let digest = Sha256::digest(self.canonical_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Text diagram, one wire per qubit and one column per gate.
    #[must_use]
    pub fn diagram(&self) -> String {
        let label_width = format!("q{}", self.qubit_count.saturating_sub(1)).len();
        let mut rows: Vec<String> = (0..self.qubit_count)
            .map(|q| format!("{:<label_width$}: ─", format!("q{q}")))
            .collect();
        for gate in &self.gates {
            let cells: Vec<Option<String>> = (0..self.qubit_count).map(|q| gate.cell(q)).collect();
            let width = cells
                .iter()
                .flatten()
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(1);
            for (row, cell) in rows.iter_mut().zip(cells) {
                let text = cell.unwrap_or_default();
                let pad = width - text.chars().count();
                row.push_str(&text);
                row.push_str(&"─".repeat(pad + 1));
            }
        }
        let mut out = String::new();
        for (q, row) in rows.iter().enumerate() {
            let register = self
                .measurement
                .registers
                .iter()
                .find(|r| r.qubits.contains(&q))
                .map_or("", |r| r.name.as_str());
            let _ = writeln!(out, "{row}┤ {register}");
        }
        out
    }
}
