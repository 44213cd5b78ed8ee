// src/scanner/rules.rs
//! Ordered rule table: first matching rule decides a unit's tag.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use super::predicates::{Predicate, UnitView};
use crate::error::{QtraceError, Result};
use crate::types::Tag;

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub tag: Tag,
    pub predicate: Predicate,
    /// Taxonomy weight the aggregator applies to units this rule tags.
    pub weight: f64,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {} (w={:.2})", self.predicate, self.tag, self.weight)
    }
}

/// Immutable after construction; shared by reference across a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RawRule>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    tag: String,
    #[serde(rename = "match")]
    predicate: String,
    weight: f64,
}

impl Default for RuleTable {
    fn default() -> Self {
        let row = |tag, predicate, weight| Rule {
            tag,
            predicate,
            weight,
        };
        Self {
            rules: vec![
                row(Tag::ProbabilisticBomb, Predicate::TemporalEquality, 0.95),
                row(Tag::ProbabilisticBomb, Predicate::RandomThreshold, 0.90),
                row(Tag::AntiDebug, Predicate::DebuggerProbe, 0.85),
                row(Tag::Steganography, Predicate::EncodedLiteral, 0.80),
                row(Tag::ChainedLogic, Predicate::FlagChain { min_flags: 3 }, 0.80),
                row(Tag::Entanglement, Predicate::SharedMutableState, 0.70),
            ],
        }
    }
}

impl RuleTable {
    /// Builds a table from explicit rows.
    ///
    /// # Errors
    /// Returns `Config` if a row tags units `Benign` or carries a weight
    /// outside `[0, 1]`.
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        for (i, rule) in rules.iter().enumerate() {
            if rule.tag.is_benign() {
                return Err(QtraceError::config(format!(
                    "rule {}: Benign is the fallback tag and cannot be assigned by a rule",
                    i + 1
                )));
            }
            if !(0.0..=1.0).contains(&rule.weight) {
                return Err(QtraceError::config(format!(
                    "rule {}: weight {} is outside [0, 1]",
                    i + 1,
                    rule.weight
                )));
            }
        }
        Ok(Self { rules })
    }

    /// Parses a TOML rule file made of `[[rule]]` entries.
    ///
    /// # Errors
    /// Returns `Toml` for malformed TOML and `Config` for unknown tags,
    /// unknown predicates or out-of-range weights.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: RuleFile = toml::from_str(content)?;
        let mut rules = Vec::with_capacity(file.rules.len());
        for (i, raw) in file.rules.into_iter().enumerate() {
            let tag = raw
                .tag
                .parse::<Tag>()
                .map_err(|e| QtraceError::config(format!("rule {}: {e}", i + 1)))?;
            let predicate = raw
                .predicate
                .parse::<Predicate>()
                .map_err(|e| QtraceError::config(format!("rule {}: {e}", i + 1)))?;
            rules.push(Rule {
                tag,
                predicate,
                weight: raw.weight,
            });
        }
        Self::new(rules)
    }

    /// # Errors
    /// Returns `Io` if the file cannot be read, otherwise as [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = crate::config::io::read(path)?;
        Self::from_toml_str(&content)
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First matching rule in table order.
    #[must_use]
    pub fn classify(&self, unit: &UnitView<'_>) -> Option<&Rule> {
        self.rules.iter().find(|r| r.predicate.matches(unit))
    }

    /// Same as [`Self::classify`] but ignores cross-unit predicates; used for
    /// module-level statements, which never own state.
    #[must_use]
    pub fn classify_local(&self, unit: &UnitView<'_>) -> Option<&Rule> {
        self.rules
            .iter()
            .filter(|r| !r.predicate.is_cross_unit())
            .find(|r| r.predicate.matches(unit))
    }

    /// Highest weight declared for each tag.
    #[must_use]
    pub fn tag_weights(&self) -> BTreeMap<Tag, f64> {
        let mut weights = BTreeMap::new();
        for rule in &self.rules {
            let entry = weights.entry(rule.tag).or_insert(rule.weight);
            if rule.weight > *entry {
                *entry = rule.weight;
            }
        }
        weights
    }

    /// Renders the table back into the file format.
    #[must_use]
    pub fn to_toml(&self) -> String {
        let mut out = String::new();
        for rule in &self.rules {
            out.push_str("[[rule]]\n");
            out.push_str(&format!("tag = \"{}\"\n", rule.tag));
            out.push_str(&format!("match = \"{}\"\n", rule.predicate));
            out.push_str(&format!("weight = {:?}\n\n", rule.weight));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_orders_bombs_first() {
        let table = RuleTable::default();
        assert_eq!(table.rules()[0].tag, Tag::ProbabilisticBomb);
        assert_eq!(table.rules().len(), 6);
        let weights = table.tag_weights();
        assert_eq!(weights[&Tag::ProbabilisticBomb], 0.95);
        assert!(!weights.contains_key(&Tag::Benign));
    }

    #[test]
    fn parses_rule_file() -> Result<()> {
        let table = RuleTable::from_toml_str(
            r#"
[[rule]]
tag = "anti_debug"
match = "debugger-probe"
weight = 0.5

[[rule]]
tag = "ChainedLogic"
match = "flag-chain(2)"
weight = 0.6
"#,
        )?;
        assert_eq!(table.rules().len(), 2);
        assert_eq!(table.rules()[1].predicate, Predicate::FlagChain { min_flags: 2 });
        Ok(())
    }

    #[test]
    fn default_table_survives_its_own_rendering() -> Result<()> {
        let table = RuleTable::default();
        assert_eq!(RuleTable::from_toml_str(&table.to_toml())?, table);
        Ok(())
    }

    #[test]
    fn rejects_bad_rows() {
        let unknown_tag = "[[rule]]\ntag = \"Malware\"\nmatch = \"debugger-probe\"\nweight = 0.5\n";
        assert!(matches!(
            RuleTable::from_toml_str(unknown_tag),
            Err(QtraceError::Config(_))
        ));
        let heavy = "[[rule]]\ntag = \"AntiDebug\"\nmatch = \"debugger-probe\"\nweight = 1.5\n";
        assert!(matches!(RuleTable::from_toml_str(heavy), Err(QtraceError::Config(_))));
        let unknown_match = "[[rule]]\ntag = \"AntiDebug\"\nmatch = \"yara\"\nweight = 0.5\n";
        assert!(matches!(
            RuleTable::from_toml_str(unknown_match),
            Err(QtraceError::Config(_))
        ));
        let benign = "[[rule]]\ntag = \"Benign\"\nmatch = \"debugger-probe\"\nweight = 0.5\n";
        assert!(RuleTable::from_toml_str(benign).is_err());
    }
}
