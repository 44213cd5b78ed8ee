//! Main execution logic for the analysis engine.
//! Scanner, per-unit simulation, pairwise correlation and aggregation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use crate::config::{AnalysisConfig, Config};
use crate::encoder::{Coupling, ENCODER_VERSION};
use crate::error::Result;
use crate::graph::LogicGraph;
use crate::redteam::{TaxonomyDigest, TaxonomySink};
use crate::report::{AnalysisReport, SkippedPair, SkippedUnit};
use crate::risk::correlation::CorrelationEdge;
use crate::risk::overall::{self, Scored};
use crate::risk::{RiskScore, WeightTable};
use crate::scanner::rules::RuleTable;
use crate::scanner::Scanner;
use crate::simulator::{SimulatorPort, StatevectorSimulator};
use crate::types::{CodeUnit, ParseError};

use super::worker::{self, PairOutcome, UnitOutcome};

/// Holds the startup-loaded rule and weight tables. Requests share it by
/// reference and never mutate it.
pub struct Engine {
    rules: RuleTable,
    weights: WeightTable,
    red_team: Option<Arc<dyn TaxonomySink>>,
}

impl Default for Engine {
    fn default() -> Self {
        let rules = RuleTable::default();
        let weights = WeightTable::default();
        Self::new(rules, weights)
    }
}

impl Engine {
    #[must_use]
    pub fn new(rules: RuleTable, weights: WeightTable) -> Self {
        Self {
            rules,
            weights,
            red_team: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let weights = WeightTable::new(&config.weights, &config.rules);
        Self::new(config.rules.clone(), weights)
    }

    /// Registers the sink that receives taxonomy digests when
    /// `enable_red_team` is set.
    #[must_use]
    pub fn with_red_team(mut self, sink: Arc<dyn TaxonomySink>) -> Self {
        self.red_team = Some(sink);
        self
    }

    #[must_use]
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    #[must_use]
    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Analyzes one source text with the default statevector simulator.
    ///
    /// # Errors
    /// Returns `Config` if `config` is out of range; nothing runs in that case.
    pub fn submit(&self, source: &str, config: &AnalysisConfig) -> Result<AnalysisReport> {
        let simulator = StatevectorSimulator::from_config(config);
        self.analyze_with(source, config, &simulator)
    }

    /// Same as [`Self::submit`] with a caller-supplied simulator.
    ///
    /// # Errors
    /// Returns `Config` if `config` is out of range.
    pub fn analyze_with(
        &self,
        source: &str,
        config: &AnalysisConfig,
        simulator: &dyn SimulatorPort,
    ) -> Result<AnalysisReport> {
        config.validate()?;
        let scan = Scanner::new(&self.rules).scan(source);
        tracing::info!(
            units = scan.units.len(),
            parse_errors = scan.parse_errors.len(),
            "analysis started"
        );
        Ok(self.run(scan.units, scan.parse_errors, config, simulator))
    }

    /// Analyzes already extracted units, skipping the scanner.
    ///
    /// # Errors
    /// Returns `Config` if `config` is out of range.
    pub fn analyze_units(
        &self,
        units: Vec<CodeUnit>,
        config: &AnalysisConfig,
        simulator: &dyn SimulatorPort,
    ) -> Result<AnalysisReport> {
        config.validate()?;
        tracing::info!(units = units.len(), "analysis started");
        Ok(self.run(units, Vec::new(), config, simulator))
    }

    fn run(
        &self,
        units: Vec<CodeUnit>,
        parse_errors: Vec<ParseError>,
        config: &AnalysisConfig,
        simulator: &dyn SimulatorPort,
    ) -> AnalysisReport {
        // Phase 1: per-unit encode + simulate + score (parallel)
        let outcomes: Vec<UnitOutcome> = units
            .par_iter()
            .map(|unit| worker::run_unit(unit, simulator, &self.weights))
            .collect();

        let mut scores: BTreeMap<String, RiskScore> = BTreeMap::new();
        let mut skipped: Vec<SkippedUnit> = Vec::new();
        for outcome in outcomes {
            match outcome {
                UnitOutcome::Scored { unit_id, score } => {
                    scores.insert(unit_id, score);
                }
                UnitOutcome::Skipped(s) => {
                    tracing::warn!(unit = %s.unit_id, reason = %s.reason, "unit skipped");
                    skipped.push(s);
                }
            }
        }

        // Phase 2: joint circuits for dependency-connected pairs (parallel)
        let (jobs, capped_pairs) = pair_jobs(&units, config.max_pairwise_units);
        if capped_pairs > 0 {
            tracing::warn!(capped = capped_pairs, "correlation jobs capped");
        }
        let pair_outcomes: Vec<PairOutcome> = jobs
            .par_iter()
            .map(|(a, b, coupling)| worker::run_pair(a, b, *coupling, simulator))
            .collect();

        let mut correlations: Vec<CorrelationEdge> = Vec::new();
        let mut skipped_pairs: Vec<SkippedPair> = Vec::new();
        for outcome in pair_outcomes {
            match outcome {
                PairOutcome::Edge(edge) if edge.strength >= config.entanglement_threshold => {
                    correlations.push(edge);
                }
                PairOutcome::Edge(_) => {}
                PairOutcome::Skipped(p) => {
                    tracing::warn!(a = %p.unit_a, b = %p.unit_b, reason = %p.reason, "pair skipped");
                    skipped_pairs.push(p);
                }
            }
        }

        // Phase 3: aggregation (single writer)
        let scored: Vec<Scored<'_>> = units
            .iter()
            .filter_map(|u| {
                scores.get(&u.id).map(|score| Scored {
                    id: &u.id,
                    tag: u.tag,
                    score,
                })
            })
            .collect();
        let overall_risk = overall::overall_risk(&scored, &correlations, &self.weights);
        let confidence = overall::report_confidence(
            &scored,
            skipped.len() + skipped_pairs.len(),
            config.confidence_penalty,
        );
        let ranking = overall::ranking(&scored, &correlations, &self.weights);
        let graph = LogicGraph::build(&units, &scores, &correlations);

        let red_team = config.enable_red_team.then(|| {
            let digest = TaxonomyDigest::from_units(&units);
            if let Some(sink) = &self.red_team {
                if let Err(e) = sink.accept(&digest) {
                    tracing::warn!(error = %e, "red-team sink rejected digest");
                }
            }
            digest
        });

        let degraded = !parse_errors.is_empty()
            || !skipped.is_empty()
            || !skipped_pairs.is_empty()
            || capped_pairs > 0;

        tracing::info!(
            scored = scores.len(),
            skipped = skipped.len(),
            skipped_pairs = skipped_pairs.len(),
            correlations = correlations.len(),
            overall_risk,
            degraded,
            "analysis finished"
        );

        AnalysisReport {
            encoder_version: ENCODER_VERSION,
            units,
            scores,
            skipped,
            parse_errors,
            correlations,
            skipped_pairs,
            capped_pairs,
            ranking,
            graph,
            overall_risk,
            confidence,
            degraded,
            red_team,
        }
    }
}

/// Sorted, deduplicated pairs joined by a dependency, truncated to `cap`.
/// Returns the jobs and how many were dropped.
fn pair_jobs(units: &[CodeUnit], cap: usize) -> (Vec<(&CodeUnit, &CodeUnit, Coupling)>, usize) {
    let by_id: BTreeMap<&str, &CodeUnit> = units.iter().map(|u| (u.id.as_str(), u)).collect();
    let mut pairs: BTreeSet<(&str, &str)> = BTreeSet::new();
    for unit in units {
        for dep in &unit.dependencies {
            let Some(other) = by_id.get(dep.as_str()) else {
                continue;
            };
            if other.id == unit.id {
                continue;
            }
            let key = if unit.id < other.id {
                (unit.id.as_str(), other.id.as_str())
            } else {
                (other.id.as_str(), unit.id.as_str())
            };
            pairs.insert(key);
        }
    }

    let dropped = pairs.len().saturating_sub(cap);
    let jobs = pairs
        .into_iter()
        .take(cap)
        .filter_map(|(a, b)| {
            let (ua, ub) = (by_id.get(a)?, by_id.get(b)?);
            let coupling = Coupling::between(ua, ub).unwrap_or(Coupling::Call);
            Some((*ua, *ub, coupling))
        })
        .collect();
    (jobs, dropped)
}
