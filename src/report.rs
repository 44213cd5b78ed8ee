// src/report.rs
//! The folded result of one `submit()` call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::LogicGraph;
use crate::redteam::TaxonomyDigest;
use crate::risk::correlation::CorrelationEdge;
use crate::risk::overall::RankEntry;
use crate::risk::RiskScore;
use crate::simulator::SimulationError;
use crate::types::{CodeUnit, ParseError, Tag};

/// A unit removed from scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedUnit {
    pub unit_id: String,
    pub reason: SimulationError,
}

/// A correlation job whose joint simulation failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub unit_a: String,
    pub unit_b: String,
    pub reason: SimulationError,
}

/// Contains no wall-clock data: identical input serializes identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub encoder_version: u32,
    /// Source order.
    pub units: Vec<CodeUnit>,
    pub scores: BTreeMap<String, RiskScore>,
    pub skipped: Vec<SkippedUnit>,
    pub parse_errors: Vec<ParseError>,
    pub correlations: Vec<CorrelationEdge>,
    pub skipped_pairs: Vec<SkippedPair>,
    /// Correlation jobs dropped by `max_pairwise_units`.
    pub capped_pairs: usize,
    pub ranking: Vec<RankEntry>,
    pub graph: LogicGraph,
    pub overall_risk: f64,
    pub confidence: f64,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub red_team: Option<TaxonomyDigest>,
}

/// Flat per-unit view for external consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRecord {
    pub unit_id: String,
    pub tag: Tag,
    pub risk_score: Option<f64>,
    pub confidence: Option<f64>,
    pub correlations: Vec<LinkRecord>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub unit_id: String,
    pub strength: f64,
}

impl AnalysisReport {
    #[must_use]
    pub fn unit(&self, id: &str) -> Option<&CodeUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    #[must_use]
    pub fn score(&self, id: &str) -> Option<&RiskScore> {
        self.scores.get(id)
    }

    #[must_use]
    pub fn skipped_reason(&self, id: &str) -> Option<&SimulationError> {
        self.skipped
            .iter()
            .find(|s| s.unit_id == id)
            .map(|s| &s.reason)
    }

    #[must_use]
    pub fn edge(&self, a: &str, b: &str) -> Option<&CorrelationEdge> {
        self.correlations
            .iter()
            .find(|e| e.involves(a) && e.other(a) == Some(b))
    }

    /// One record per unit, in source order.
    #[must_use]
    pub fn records(&self) -> Vec<UnitRecord> {
        self.units
            .iter()
            .map(|unit| {
                let score = self.scores.get(&unit.id);
                let correlations = self
                    .correlations
                    .iter()
                    .filter_map(|e| {
                        e.other(&unit.id).map(|other| LinkRecord {
                            unit_id: other.to_string(),
                            strength: e.strength,
                        })
                    })
                    .collect();
                UnitRecord {
                    unit_id: unit.id.clone(),
                    tag: unit.tag,
                    risk_score: score.map(|s| s.value),
                    confidence: score.map(|s| s.confidence),
                    correlations,
                    error: self.skipped_reason(&unit.id).map(ToString::to_string),
                }
            })
            .collect()
    }

    /// # Errors
    /// Returns `Json` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    /// Returns `Json` if serialization fails.
    pub fn records_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.records())?)
    }
}
