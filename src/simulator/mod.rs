// src/simulator/mod.rs
//! Simulator port and the default statevector adapter.

pub mod sampling;
pub mod statevector;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::circuit::{CircuitSpec, Gate};
use crate::config::AnalysisConfig;
use crate::types::Tag;
use statevector::{bitstring, StateVector};

/// Probabilities below this are dropped from exact distributions.
const PRUNE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimulationError {
    #[error("circuit needs {qubits} qubits, ceiling is {limit}")]
    Overflow { qubits: usize, limit: usize },
    #[error("simulation exceeded its {budget_ms} ms budget")]
    Timeout { budget_ms: u64 },
    #[error("gate addresses qubit {qubit} of a {qubit_count}-qubit circuit")]
    InvalidCircuit { qubit: usize, qubit_count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backend {
    Exact,
    Sampled { shots: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub tag: Tag,
    pub qubit_count: usize,
    pub taxonomy_bits: usize,
    pub backend: Backend,
    /// Bitstring (qubit 0 first) to probability.
    pub distribution: BTreeMap<String, f64>,
    /// Shannon entropy in bits.
    pub entropy: f64,
    pub dominant_state: String,
    pub dominant_probability: f64,
    /// Probability that every branch qubit reads 1.
    pub trigger_probability: f64,
}

impl SimulationResult {
    /// Builds the summary statistics from a finished distribution.
    #[must_use]
    pub fn from_distribution(
        spec: &CircuitSpec,
        backend: Backend,
        distribution: BTreeMap<String, f64>,
    ) -> Self {
        let entropy = shannon_entropy(distribution.values().copied());
        let (dominant_state, dominant_probability) = distribution
            .iter()
            .fold((String::new(), f64::NEG_INFINITY), |best, (state, &p)| {
                if p > best.1 {
                    (state.clone(), p)
                } else {
                    best
                }
            });
        let taxonomy_bits = spec
            .measurement
            .register("taxonomy")
            .map_or(0, |r| r.qubits.len());
        let trigger_probability = spec.measurement.register("branch").map_or(0.0, |branch| {
            distribution
                .iter()
                .filter(|(state, _)| {
                    let bits = state.as_bytes();
                    branch.qubits.iter().all(|&q| bits.get(q) == Some(&b'1'))
                })
                .map(|(_, p)| p)
                .sum()
        });
        Self {
            tag: spec.tag,
            qubit_count: spec.qubit_count,
            taxonomy_bits,
            backend,
            distribution,
            entropy,
            dominant_state,
            dominant_probability: dominant_probability.max(0.0),
            trigger_probability,
        }
    }

    /// Marginal distribution over `qubits`, in the given order.
    #[must_use]
    pub fn marginal(&self, qubits: &[usize]) -> BTreeMap<String, f64> {
        let mut out: BTreeMap<String, f64> = BTreeMap::new();
        for (state, p) in &self.distribution {
            let bits = state.as_bytes();
            let key: String = qubits
                .iter()
                .map(|&q| if bits.get(q) == Some(&b'1') { '1' } else { '0' })
                .collect();
            *out.entry(key).or_insert(0.0) += p;
        }
        out
    }

    #[must_use]
    pub fn total_probability(&self) -> f64 {
        self.distribution.values().sum()
    }
}

/// Shannon entropy in bits; zero-probability outcomes contribute nothing.
#[must_use]
pub fn shannon_entropy(probabilities: impl IntoIterator<Item = f64>) -> f64 {
    probabilities
        .into_iter()
        .filter(|p| *p > 0.0)
        .map(|p| -p * p.log2())
        .sum::<f64>()
        .max(0.0)
}

/// Executes circuit specs. Implementations must be deterministic for a given
/// spec and must not share mutable state between calls.
pub trait SimulatorPort: Send + Sync {
    /// # Errors
    /// `Overflow` when the circuit is wider than the adapter allows,
    /// `Timeout` when the wall-clock budget runs out.
    fn run(&self, spec: &CircuitSpec) -> Result<SimulationResult, SimulationError>;
}

/// Default adapter: exact statevector for narrow circuits, shot sampling of
/// the same statevector for wide ones.
#[derive(Debug, Clone)]
pub struct StatevectorSimulator {
    pub max_qubits: usize,
    pub exact_qubit_limit: usize,
    pub shots: usize,
    pub timeout: Duration,
    pub seed: u64,
}

impl StatevectorSimulator {
    #[must_use]
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            max_qubits: config.max_qubits,
            exact_qubit_limit: config.exact_qubit_limit,
            shots: config.shots,
            timeout: config.timeout(),
            seed: config.seed,
        }
    }

    fn timed_out(&self, deadline: Instant) -> SimulationError {
        tracing::trace!(?deadline, "simulation deadline passed");
        SimulationError::Timeout {
            budget_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl SimulatorPort for StatevectorSimulator {
    fn run(&self, spec: &CircuitSpec) -> Result<SimulationResult, SimulationError> {
        if spec.qubit_count > self.max_qubits {
            return Err(SimulationError::Overflow {
                qubits: spec.qubit_count,
                limit: self.max_qubits,
            });
        }
        if let Some(qubit) = spec
            .gates
            .iter()
            .map(Gate::max_qubit)
            .find(|q| *q >= spec.qubit_count)
        {
            return Err(SimulationError::InvalidCircuit {
                qubit,
                qubit_count: spec.qubit_count,
            });
        }
        let deadline = Instant::now() + self.timeout;
        if Instant::now() >= deadline {
            return Err(self.timed_out(deadline));
        }

        let mut state = StateVector::zero(spec.qubit_count);
        for gate in &spec.gates {
            if Instant::now() >= deadline {
                return Err(self.timed_out(deadline));
            }
            state.apply(gate);
        }
        let probabilities = state.probabilities();

        if spec.qubit_count <= self.exact_qubit_limit {
            let distribution = exact_distribution(&probabilities, spec.qubit_count);
            return Ok(SimulationResult::from_distribution(spec, Backend::Exact, distribution));
        }

        let seed = self.seed ^ spec.fingerprint_seed();
        let distribution =
            sampling::sample(&probabilities, spec.qubit_count, self.shots, seed, deadline)
                .ok_or_else(|| self.timed_out(deadline))?;
        Ok(SimulationResult::from_distribution(
            spec,
            Backend::Sampled { shots: self.shots },
            distribution,
        ))
    }
}

fn exact_distribution(probabilities: &[f64], qubits: usize) -> BTreeMap<String, f64> {
    let kept: Vec<(usize, f64)> = probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| *p > PRUNE_EPSILON)
        .collect();
    let total: f64 = kept.iter().map(|(_, p)| p).sum();
    kept.into_iter()
        .map(|(i, p)| (bitstring(i, qubits), p / total))
        .collect()
}
