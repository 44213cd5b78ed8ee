// src/risk/weights.rs
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{OverallWeights, WeightConfig};
use crate::scanner::rules::RuleTable;
use crate::types::Tag;

/// Declared coefficients of the scoring formulas. Built once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    pub tags: BTreeMap<Tag, f64>,
    pub base: f64,
    pub entropy: f64,
    pub balance: f64,
    pub overall: OverallWeights,
}

impl WeightTable {
    /// Per-tag weights come from the rule table (max per tag); Benign and any
    /// tag the table never assigns fall back to `weights.benign`.
    #[must_use]
    pub fn new(weights: &WeightConfig, rules: &RuleTable) -> Self {
        let mut tags = rules.tag_weights();
        for tag in Tag::ALL {
            tags.entry(tag).or_insert(weights.benign);
        }
        tags.insert(Tag::Benign, weights.benign);
        Self {
            tags,
            base: weights.base,
            entropy: weights.entropy,
            balance: weights.balance,
            overall: weights.overall,
        }
    }

    #[must_use]
    pub fn tag_weight(&self, tag: Tag) -> f64 {
        self.tags.get(&tag).copied().unwrap_or(0.0)
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::new(&WeightConfig::default(), &RuleTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_take_rule_maxima_and_benign_default() {
        let table = WeightTable::default();
        assert_eq!(table.tag_weight(Tag::ProbabilisticBomb), 0.95);
        assert_eq!(table.tag_weight(Tag::Entanglement), 0.70);
        assert_eq!(table.tag_weight(Tag::Benign), 0.1);
        assert_eq!(table.tags.len(), Tag::ALL.len());
    }

    #[test]
    fn unassigned_tags_fall_back_to_benign_weight() -> crate::error::Result<()> {
        let rules = RuleTable::from_toml_str(
            "[[rule]]\ntag = \"AntiDebug\"\nmatch = \"debugger-probe\"\nweight = 0.4\n",
        )?;
        let table = WeightTable::new(&WeightConfig::default(), &rules);
        assert_eq!(table.tag_weight(Tag::AntiDebug), 0.4);
        assert_eq!(table.tag_weight(Tag::Steganography), 0.1);
        Ok(())
    }
}
