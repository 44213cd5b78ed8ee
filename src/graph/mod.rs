// src/graph/mod.rs
//! Dependency and correlation graph over analyzed units.

pub mod influence;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::encoder::Coupling;
use crate::risk::correlation::CorrelationEdge;
use crate::risk::RiskScore;
use crate::types::{CodeUnit, Tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Nominal,
    Elevated,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn from_risk(risk: f64) -> Self {
        if risk > 0.7 {
            Self::Critical
        } else if risk > 0.3 {
            Self::Elevated
        } else {
            Self::Nominal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Call,
    SharedState,
    Correlation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub tag: Tag,
    /// `None` for units whose simulation was skipped.
    pub risk: Option<f64>,
    pub severity: Severity,
    pub influence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub strength: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl LogicGraph {
    /// Assembles the graph. Dependency edges point from a unit to each of
    /// its dependencies; correlation edges run `unit_a -> unit_b`.
    #[must_use]
    pub fn build(
        units: &[CodeUnit],
        scores: &BTreeMap<String, RiskScore>,
        correlations: &[CorrelationEdge],
    ) -> Self {
        let by_id: BTreeMap<&str, &CodeUnit> = units.iter().map(|u| (u.id.as_str(), u)).collect();

        let mut edges = Vec::new();
        let mut weighted = influence::Edges::new();
        for unit in units {
            for dep in &unit.dependencies {
                let Some(other) = by_id.get(dep.as_str()) else {
                    continue;
                };
                let coupling = Coupling::between(unit, other).unwrap_or(Coupling::Call);
                let kind = if coupling == Coupling::Call {
                    EdgeKind::Call
                } else {
                    EdgeKind::SharedState
                };
                let strength = coupling.strength();
                weighted
                    .entry(unit.id.clone())
                    .or_default()
                    .insert(dep.clone(), strength);
                edges.push(GraphEdge {
                    source: unit.id.clone(),
                    target: dep.clone(),
                    kind,
                    strength,
                });
            }
        }
        edges.extend(correlations.iter().map(|c| GraphEdge {
            source: c.unit_a.clone(),
            target: c.unit_b.clone(),
            kind: EdgeKind::Correlation,
            strength: c.strength,
        }));

        let ids: BTreeSet<String> = units.iter().map(|u| u.id.clone()).collect();
        let personalization: BTreeMap<String, f64> = scores
            .iter()
            .map(|(id, s)| (id.clone(), s.value))
            .collect();
        let ranks = influence::compute(&weighted, &ids, &personalization);

        let nodes = units
            .iter()
            .map(|u| {
                let risk = scores.get(&u.id).map(|s| s.value);
                GraphNode {
                    id: u.id.clone(),
                    tag: u.tag,
                    risk,
                    severity: Severity::from_risk(risk.unwrap_or(0.0)),
                    influence: ranks.get(&u.id).copied().unwrap_or(0.0),
                }
            })
            .collect();

        Self { nodes, edges }
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Ids directly connected to `id`, either direction, any edge kind.
    #[must_use]
    pub fn neighbors(&self, id: &str) -> BTreeSet<&str> {
        self.edges
            .iter()
            .filter_map(|e| {
                if e.source == id {
                    Some(e.target.as_str())
                } else if e.target == id {
                    Some(e.source.as_str())
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Complexity, RiskLevel};

    fn unit(id: &str, writes: &[&str], calls: &[&str]) -> CodeUnit {
        let mut u = CodeUnit::synthetic(id, Tag::Entanglement, Complexity::default());
        u.state_writes = writes.iter().map(|s| (*s).to_string()).collect();
        u.calls = calls.iter().map(|s| (*s).to_string()).collect();
        u.dependencies = u.calls.clone();
        u
    }

    fn score(value: f64) -> RiskScore {
        RiskScore {
            value,
            confidence: 1.0,
            level: RiskLevel::from_score(value),
            contributing_factors: Vec::new(),
        }
    }

    #[test]
    fn severity_bands() {
        assert_eq!(Severity::from_risk(0.71), Severity::Critical);
        assert_eq!(Severity::from_risk(0.7), Severity::Elevated);
        assert_eq!(Severity::from_risk(0.3), Severity::Nominal);
    }

    #[test]
    fn edges_carry_coupling_strength() {
        let mut a = unit("a", &["counter"], &[]);
        let mut b = unit("b", &["counter"], &[]);
        a.dependencies.insert("b".into());
        b.dependencies.insert("a".into());
        let c = unit("c", &[], &["a"]);
        let scores = BTreeMap::from([("a".to_string(), score(0.8)), ("c".to_string(), score(0.2))]);
        let graph = LogicGraph::build(&[a, b, c], &scores, &[]);

        let shared = graph
            .edges
            .iter()
            .find(|e| e.source == "a" && e.target == "b")
            .map(|e| (e.kind, e.strength));
        assert_eq!(shared, Some((EdgeKind::SharedState, 1.0)));
        let call = graph.edges.iter().find(|e| e.source == "c");
        assert_eq!(call.map(|e| e.kind), Some(EdgeKind::Call));

        assert_eq!(graph.node("b").and_then(|n| n.risk), None);
        assert_eq!(graph.node("a").map(|n| n.severity), Some(Severity::Critical));
        let total: f64 = graph.nodes.iter().map(|n| n.influence).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(graph.neighbors("a"), BTreeSet::from(["b", "c"]));
    }
}
