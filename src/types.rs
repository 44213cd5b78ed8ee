// src/types.rs
//! Common data structures shared by the scanner, encoder and aggregator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Behavioral taxonomy assigned to every code unit.
///
/// Declaration order is the taxonomy code used by the encoder
/// (`Benign = 0` … `AntiDebug = 5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tag {
    Benign,
    ProbabilisticBomb,
    ChainedLogic,
    Steganography,
    Entanglement,
    AntiDebug,
}

impl Tag {
    pub const ALL: [Tag; 6] = [
        Tag::Benign,
        Tag::ProbabilisticBomb,
        Tag::ChainedLogic,
        Tag::Steganography,
        Tag::Entanglement,
        Tag::AntiDebug,
    ];

    /// Numeric code spelled onto the taxonomy qubits.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Benign => "Benign",
            Self::ProbabilisticBomb => "ProbabilisticBomb",
            Self::ChainedLogic => "ChainedLogic",
            Self::Steganography => "Steganography",
            Self::Entanglement => "Entanglement",
            Self::AntiDebug => "AntiDebug",
        }
    }

    #[must_use]
    pub fn is_benign(self) -> bool {
        self == Self::Benign
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        Tag::ALL
            .into_iter()
            .find(|t| t.name().to_ascii_lowercase() == folded)
            .ok_or_else(|| format!("unknown tag '{s}'"))
    }
}

/// Location of a construct in the submitted source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    /// 1-based first line.
    pub start_line: usize,
    /// 1-based last line (inclusive).
    pub end_line: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "line {}", self.start_line)
        } else {
            write!(f, "lines {}-{}", self.start_line, self.end_line)
        }
    }
}

/// A top-level block that could not be parsed. Non-fatal: the block is
/// skipped and scanning continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message} ({span})")]
pub struct ParseError {
    pub span: SourceSpan,
    pub message: String,
}

/// Structural counts that drive circuit synthesis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Complexity {
    /// `if`/`elif`/`while`/`for` headers and `except` handlers.
    pub branches: usize,
    /// `and`/`or`/`not` operators across all expressions.
    pub boolean_ops: usize,
    /// Deepest nesting of branches.
    pub max_depth: usize,
}

/// What kind of construct a unit was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Function,
    Method,
    Conditional,
    Loop,
    Statement,
}

impl UnitKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Conditional => "conditional",
            Self::Loop => "loop",
            Self::Statement => "statement",
        }
    }
}

/// One analyzed construct. Created by the scanner, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub id: String,
    pub kind: UnitKind,
    pub name: String,
    pub span: SourceSpan,
    pub tag: Tag,
    /// Description of the rule that decided the tag.
    pub rule: Option<String>,
    pub complexity: Complexity,
    /// Ids of units this one calls or shares mutable state with.
    pub dependencies: BTreeSet<String>,
    /// Ids of units this one calls.
    pub calls: BTreeSet<String>,
    /// Module-level mutable objects read by this unit.
    pub state_reads: BTreeSet<String>,
    /// Module-level mutable objects written by this unit.
    pub state_writes: BTreeSet<String>,
}

impl CodeUnit {
    /// Builds a bare unit with no dependencies; mostly useful for synthetic inputs.
    #[must_use]
    pub fn synthetic(id: &str, tag: Tag, complexity: Complexity) -> Self {
        Self {
            id: id.to_string(),
            kind: UnitKind::Function,
            name: id.to_string(),
            span: SourceSpan::default(),
            tag,
            rule: None,
            complexity,
            dependencies: BTreeSet::new(),
            calls: BTreeSet::new(),
            state_reads: BTreeSet::new(),
            state_writes: BTreeSet::new(),
        }
    }
}

impl Default for SourceSpan {
    fn default() -> Self {
        Self {
            start_line: 1,
            end_line: 1,
            start_byte: 0,
            end_byte: 0,
        }
    }
}

/// Coarse risk band used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Safe,
    Low,
    High,
    Extreme,
}

impl RiskLevel {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > 0.5 {
            Self::Extreme
        } else if score > 0.3 {
            Self::High
        } else if score > 0.1 {
            Self::Low
        } else {
            Self::Safe
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Low => "LOW RISK",
            Self::High => "HIGH RISK",
            Self::Extreme => "EXTREME RISK",
        }
    }
}
