// src/scanner/mod.rs
//! Source scanner: block split, parse, lower, extract units, tag them.

pub mod blocks;
pub mod facts;
pub mod lower;
pub mod predicates;
pub mod rules;
pub mod syntax;
pub mod units;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{CodeUnit, ParseError, Tag, UnitKind};
use facts::{ModuleIndex, UnitFacts};
use predicates::UnitView;
use rules::RuleTable;
use syntax::Stmt;
use units::Candidate;

/// Units in source order plus the blocks that failed to parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanOutput {
    pub units: Vec<CodeUnit>,
    pub parse_errors: Vec<ParseError>,
}

pub struct Scanner<'r> {
    rules: &'r RuleTable,
}

impl<'r> Scanner<'r> {
    #[must_use]
    pub fn new(rules: &'r RuleTable) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn scan(&self, source: &str) -> ScanOutput {
        let (module, parse_errors) = parse_module(source);
        for err in &parse_errors {
            tracing::debug!(span = %err.span, "skipping unparseable block: {}", err.message);
        }

        let index = ModuleIndex::build(&module);
        let mut analyzed: Vec<Analyzed<'_>> = units::extract(&module)
            .into_iter()
            .filter_map(|candidate| {
                let facts = facts::collect(candidate.body, &candidate.scope, &index);
                // Module-level statements only count when they do something
                // suspicious on their own.
                let fixed = if candidate.kind == UnitKind::Statement {
                    let view = UnitView {
                        body: candidate.body,
                        index: &index,
                        facts: &facts,
                        shares_state: false,
                    };
                    let rule = self.rules.classify_local(&view)?;
                    Some((rule.tag, rule.predicate.to_string()))
                } else {
                    None
                };
                Some(Analyzed {
                    candidate,
                    facts,
                    fixed,
                })
            })
            .collect();
        units::disambiguate(analyzed.iter_mut().map(|a| &mut a.candidate.id));

        let known: BTreeSet<String> = analyzed.iter().map(|a| a.candidate.id.clone()).collect();
        let shared = shared_state(&analyzed);

        let units = analyzed
            .iter()
            .enumerate()
            .map(|(i, unit)| {
                let Analyzed {
                    candidate,
                    facts,
                    fixed,
                } = unit;
                let partners = shared.get(&i);
                let (tag, rule) = match fixed {
                    Some((tag, rule)) => (*tag, Some(rule.clone())),
                    None => {
                        let view = UnitView {
                            body: candidate.body,
                            index: &index,
                            facts,
                            shares_state: partners.is_some_and(|p| !p.is_empty()),
                        };
                        match self.rules.classify(&view) {
                            Some(rule) => (rule.tag, Some(rule.predicate.to_string())),
                            None => (Tag::Benign, None),
                        }
                    }
                };
                let calls = units::resolve_calls(candidate, &facts.calls, &index, &known);
                let mut dependencies = calls.clone();
                if let Some(partners) = partners {
                    dependencies.extend(partners.iter().map(|&j| analyzed[j].candidate.id.clone()));
                }
                CodeUnit {
                    id: candidate.id.clone(),
                    kind: candidate.kind,
                    name: candidate.name.clone(),
                    span: candidate.span,
                    tag,
                    rule,
                    complexity: facts.complexity,
                    dependencies,
                    calls,
                    state_reads: facts.reads.clone(),
                    state_writes: facts.writes.clone(),
                }
            })
            .collect();

        ScanOutput {
            units,
            parse_errors,
        }
    }
}

fn parse_module(source: &str) -> (Vec<Stmt>, Vec<ParseError>) {
    let mut module = Vec::new();
    let mut errors = Vec::new();
    for block in blocks::split(source) {
        match lower::parse_block(&block) {
            Ok(stmts) => module.extend(stmts),
            Err(err) => errors.push(err),
        }
    }
    (module, errors)
}

struct Analyzed<'a> {
    candidate: Candidate<'a>,
    facts: UnitFacts,
    /// Tag and rule already decided for module-level statements.
    fixed: Option<(Tag, String)>,
}

/// For each unit index, the other units it conflicts with over module state:
/// one writes an object the other reads or writes.
fn shared_state(analyzed: &[Analyzed<'_>]) -> BTreeMap<usize, BTreeSet<usize>> {
    let mut out: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for i in 0..analyzed.len() {
        for j in (i + 1)..analyzed.len() {
            let (a, b) = (&analyzed[i].facts, &analyzed[j].facts);
            let conflict = a.writes.iter().any(|o| b.reads.contains(o) || b.writes.contains(o))
                || b.writes.iter().any(|o| a.reads.contains(o));
            if conflict {
                out.entry(i).or_default().insert(j);
                out.entry(j).or_default().insert(i);
            }
        }
    }
    out
}
