// src/risk/overall.rs
//! Request-level aggregates: overall risk, report confidence and ranking.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::correlation::CorrelationEdge;
use super::{clamp01, RiskScore, WeightTable};
use crate::types::Tag;

/// A scored unit as seen by the aggregates.
#[derive(Debug, Clone, Copy)]
pub struct Scored<'a> {
    pub id: &'a str,
    pub tag: Tag,
    pub score: &'a RiskScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub unit_id: String,
    pub contribution: f64,
}

/// `clamp01(mean_w·U + peak_w·P + correlation_w·C)`.
#[must_use]
pub fn overall_risk(scored: &[Scored<'_>], edges: &[CorrelationEdge], weights: &WeightTable) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for s in scored {
        let w = weights.tag_weight(s.tag) * s.score.confidence;
        num += w * s.score.value;
        den += w;
    }
    let mean = if den > 0.0 { num / den } else { 0.0 };
    let peak = scored.iter().map(|s| s.score.value).fold(0.0, f64::max);
    let correlation = if edges.is_empty() {
        0.0
    } else {
        edges.iter().map(|e| e.strength).sum::<f64>() / edges.len() as f64
    };
    let o = &weights.overall;
    clamp01(o.mean * mean + o.peak * peak + o.correlation * correlation)
}

/// Mean scored confidence minus `penalty` per skipped unit or pair. With nothing
/// scored the base is 1 when nothing was skipped either, else 0.
#[must_use]
pub fn report_confidence(scored: &[Scored<'_>], skipped: usize, penalty: f64) -> f64 {
    let base = if scored.is_empty() {
        if skipped == 0 {
            1.0
        } else {
            0.0
        }
    } else {
        scored.iter().map(|s| s.score.confidence).sum::<f64>() / scored.len() as f64
    };
    clamp01(base - penalty * skipped as f64)
}

/// Units by contribution, descending; ties broken by id.
#[must_use]
pub fn ranking(
    scored: &[Scored<'_>],
    edges: &[CorrelationEdge],
    weights: &WeightTable,
) -> Vec<RankEntry> {
    let mut shared: BTreeMap<&str, f64> = BTreeMap::new();
    for e in edges {
        *shared.entry(e.unit_a.as_str()).or_insert(0.0) += e.strength / 2.0;
        *shared.entry(e.unit_b.as_str()).or_insert(0.0) += e.strength / 2.0;
    }
    let mut entries: Vec<RankEntry> = scored
        .iter()
        .map(|s| {
            let own = s.score.value * weights.tag_weight(s.tag) * s.score.confidence;
            let linked = shared.get(s.id).copied().unwrap_or(0.0);
            RankEntry {
                unit_id: s.id.to_string(),
                contribution: own + weights.overall.correlation * linked,
            }
        })
        .collect();
    entries.sort_by(|a, b| {
        b.contribution
            .partial_cmp(&a.contribution)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.unit_id.cmp(&b.unit_id))
    });
    entries
}
