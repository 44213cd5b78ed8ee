// src/simulator/sampling.rs
//! Shot sampling from a probability vector.

use std::collections::BTreeMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::statevector::bitstring;

/// Shots drawn between deadline checks.
const DEADLINE_STRIDE: usize = 256;

/// Draws `shots` outcomes and returns the empirical distribution, or `None`
/// if `deadline` passes first.
#[must_use]
pub fn sample(
    probabilities: &[f64],
    qubits: usize,
    shots: usize,
    seed: u64,
    deadline: Instant,
) -> Option<BTreeMap<String, f64>> {
    let cumulative: Vec<f64> = probabilities
        .iter()
        .scan(0.0, |acc, p| {
            *acc += p;
            Some(*acc)
        })
        .collect();
    let total = cumulative.last().copied().unwrap_or(0.0);
    let last = cumulative.len().saturating_sub(1);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for shot in 0..shots {
        if shot % DEADLINE_STRIDE == 0 && Instant::now() >= deadline {
            return None;
        }
        let r = rng.random::<f64>() * total;
        let index = cumulative.partition_point(|c| *c <= r).min(last);
        *counts.entry(index).or_insert(0) += 1;
    }

    let shots = shots.max(1) as f64;
    Some(
        counts
            .into_iter()
            .map(|(index, n)| (bitstring(index, qubits), n as f64 / shots))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn deterministic_outcome_always_wins() {
        let dist = sample(&[0.0, 0.0, 1.0, 0.0], 2, 100, 7, later());
        let Some(dist) = dist else {
            panic!("sampling timed out");
        };
        assert_eq!(dist.len(), 1);
        assert_eq!(dist.get("01"), Some(&1.0));
    }

    #[test]
    fn same_seed_same_counts() {
        let probs = [0.1, 0.2, 0.3, 0.4];
        assert_eq!(sample(&probs, 2, 1000, 42, later()), sample(&probs, 2, 1000, 42, later()));
    }

    #[test]
    fn frequencies_approach_probabilities() {
        let probs = [0.25, 0.75];
        let Some(dist) = sample(&probs, 1, 20_000, 3, later()) else {
            panic!("sampling timed out");
        };
        assert!((dist["1"] - 0.75).abs() < 0.02);
    }

    #[test]
    fn expired_deadline_aborts() {
        assert!(sample(&[1.0], 0, 10, 1, Instant::now()).is_none());
    }
}
