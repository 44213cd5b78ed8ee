use colored::{ColoredString, Colorize};

use crate::graph::Severity;
use crate::types::{RiskLevel, Tag};

pub(crate) fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

pub(crate) fn level_label(level: RiskLevel) -> ColoredString {
    match level {
        RiskLevel::Extreme => level.label().red().bold(),
        RiskLevel::High => level.label().red(),
        RiskLevel::Low => level.label().yellow(),
        RiskLevel::Safe => level.label().green(),
    }
}

pub(crate) fn severity_marker(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => "!!".red().bold(),
        Severity::Elevated => "! ".yellow(),
        Severity::Nominal => "  ".normal(),
    }
}

pub(crate) fn tag_label(tag: Tag) -> ColoredString {
    if tag.is_benign() {
        tag.name().dimmed()
    } else {
        tag.name().magenta()
    }
}

/// `0.754` style, three decimals.
pub(crate) fn score(value: f64) -> String {
    format!("{value:.3}")
}
