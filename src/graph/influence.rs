// src/graph/influence.rs
//! Personalized `PageRank` over weighted dependency edges.

use std::collections::{BTreeMap, BTreeSet};

const DAMPING: f64 = 0.85;
const ITERATIONS: usize = 20;

/// Adjacency: source id -> (target id -> edge weight).
pub type Edges = BTreeMap<String, BTreeMap<String, f64>>;

/// Ranks every node in `nodes`. Teleport mass follows `personalization`
/// (normalized); an empty or all-zero personalization means uniform.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute(
    edges: &Edges,
    nodes: &BTreeSet<String>,
    personalization: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    if nodes.is_empty() {
        return BTreeMap::new();
    }

    let n = nodes.len() as f64;
    let teleport = build_teleport(nodes, personalization, n);
    let mut ranks: BTreeMap<String, f64> = nodes.iter().map(|id| (id.clone(), 1.0 / n)).collect();

    for _ in 0..ITERATIONS {
        ranks = iterate_once(&ranks, edges, nodes, &teleport);
    }

    ranks
}

fn build_teleport(
    nodes: &BTreeSet<String>,
    personalization: &BTreeMap<String, f64>,
    n: f64,
) -> BTreeMap<String, f64> {
    let total: f64 = nodes
        .iter()
        .filter_map(|id| personalization.get(id))
        .filter(|w| **w > 0.0)
        .sum();
    if total <= 0.0 {
        return nodes.iter().map(|id| (id.clone(), 1.0 / n)).collect();
    }
    nodes
        .iter()
        .map(|id| {
            let w = personalization.get(id).copied().unwrap_or(0.0).max(0.0);
            (id.clone(), w / total)
        })
        .collect()
}

fn iterate_once(
    ranks: &BTreeMap<String, f64>,
    edges: &Edges,
    nodes: &BTreeSet<String>,
    teleport: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let mut incoming: BTreeMap<&str, f64> = BTreeMap::new();
    for (source, targets) in edges {
        let total_out: f64 = targets.values().sum();
        if total_out <= 0.0 {
            continue;
        }
        let source_rank = ranks.get(source).copied().unwrap_or(0.0);
        for (target, weight) in targets {
            *incoming.entry(target.as_str()).or_insert(0.0) += source_rank * weight / total_out;
        }
    }

    let mut next: BTreeMap<String, f64> = nodes
        .iter()
        .map(|id| {
            let pers = teleport.get(id).copied().unwrap_or(0.0);
            let inc = incoming.get(id.as_str()).copied().unwrap_or(0.0);
            (id.clone(), (1.0 - DAMPING) * pers + DAMPING * inc)
        })
        .collect();

    normalize(&mut next);
    next
}

fn normalize(ranks: &mut BTreeMap<String, f64>) {
    let total: f64 = ranks.values().sum();
    if total > 0.0 {
        for rank in ranks.values_mut() {
            *rank /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    fn edges(list: &[(&str, &str, f64)]) -> Edges {
        let mut out = Edges::new();
        for (s, t, w) in list {
            out.entry((*s).to_string())
                .or_default()
                .insert((*t).to_string(), *w);
        }
        out
    }

    #[test]
    fn callee_outranks_callers() {
        let ranks = compute(
            &edges(&[("a", "hub", 1.0), ("b", "hub", 1.0), ("c", "hub", 1.0)]),
            &nodes(&["a", "b", "c", "hub"]),
            &BTreeMap::new(),
        );
        assert!(ranks["hub"] > ranks["a"]);
        assert!((ranks.values().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn personalization_pulls_mass() {
        let all = nodes(&["a", "b"]);
        let uniform = compute(&Edges::new(), &all, &BTreeMap::new());
        assert!((uniform["a"] - 0.5).abs() < 1e-12);
        let pers = BTreeMap::from([("a".to_string(), 0.9), ("b".to_string(), 0.1)]);
        let skewed = compute(&Edges::new(), &all, &pers);
        assert!(skewed["a"] > skewed["b"]);
    }

    #[test]
    fn empty_graph_has_no_ranks() {
        assert!(compute(&Edges::new(), &BTreeSet::new(), &BTreeMap::new()).is_empty());
    }
}
