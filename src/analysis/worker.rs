//! Worker jobs: one unit, or one related pair. Pure functions of their
//! inputs so they can run on any pool thread.

use crate::encoder::{self, Coupling};
use crate::report::{SkippedPair, SkippedUnit};
use crate::risk::correlation::{self, CorrelationEdge};
use crate::risk::{self, RiskScore, WeightTable};
use crate::simulator::SimulatorPort;
use crate::types::CodeUnit;

#[derive(Debug, Clone)]
pub enum UnitOutcome {
    Scored { unit_id: String, score: RiskScore },
    Skipped(SkippedUnit),
}

#[derive(Debug, Clone)]
pub enum PairOutcome {
    Edge(CorrelationEdge),
    Skipped(SkippedPair),
}

/// Encode, simulate and score one unit.
#[must_use]
pub fn run_unit(
    unit: &CodeUnit,
    simulator: &dyn SimulatorPort,
    weights: &WeightTable,
) -> UnitOutcome {
    let spec = encoder::encode(unit);
    match simulator.run(&spec) {
        Ok(result) => {
            let score = risk::score(&result, weights);
            tracing::trace!(unit = %unit.id, value = score.value, "unit scored");
            UnitOutcome::Scored {
                unit_id: unit.id.clone(),
                score,
            }
        }
        Err(reason) => UnitOutcome::Skipped(SkippedUnit {
            unit_id: unit.id.clone(),
            reason,
        }),
    }
}

/// Encode and simulate the joint circuit of a related pair.
#[must_use]
pub fn run_pair(
    a: &CodeUnit,
    b: &CodeUnit,
    coupling: Coupling,
    simulator: &dyn SimulatorPort,
) -> PairOutcome {
    let spec = encoder::encode_pair(a, b, coupling);
    match simulator.run(&spec) {
        Ok(joint) => PairOutcome::Edge(correlation::edge(&a.id, &b.id, coupling, &spec, &joint)),
        Err(reason) => {
            let (unit_a, unit_b) = if a.id <= b.id {
                (a.id.clone(), b.id.clone())
            } else {
                (b.id.clone(), a.id.clone())
            };
            PairOutcome::Skipped(SkippedPair {
                unit_a,
                unit_b,
                reason,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::simulator::{SimulationError, StatevectorSimulator};
    use crate::types::{Complexity, Tag};

    fn unit(id: &str, branches: usize) -> CodeUnit {
        CodeUnit::synthetic(
            id,
            Tag::ChainedLogic,
            Complexity {
                branches,
                boolean_ops: 1,
                max_depth: 1,
            },
        )
    }

    #[test]
    fn wide_units_are_skipped_not_fatal() {
        let sim = StatevectorSimulator::from_config(&AnalysisConfig::default());
        let weights = WeightTable::default();
        assert!(matches!(
            run_unit(&unit("small", 2), &sim, &weights),
            UnitOutcome::Scored { .. }
        ));
        match run_unit(&unit("huge", 1 << 26), &sim, &weights) {
            UnitOutcome::Skipped(s) => {
                assert_eq!(s.unit_id, "huge");
                assert_eq!(
                    s.reason,
                    SimulationError::Overflow {
                        qubits: 30,
                        limit: 20
                    }
                );
            }
            UnitOutcome::Scored { .. } => panic!("30-qubit unit should overflow"),
        }
    }

    #[test]
    fn skipped_pairs_are_ordered() {
        let sim = StatevectorSimulator::from_config(&AnalysisConfig::default());
        match run_pair(&unit("zz", 1 << 10), &unit("aa", 1 << 10), Coupling::Call, &sim) {
            PairOutcome::Skipped(p) => {
                assert_eq!((p.unit_a.as_str(), p.unit_b.as_str()), ("aa", "zz"));
            }
            PairOutcome::Edge(_) => panic!("joint circuit should overflow"),
        }
    }
}
