// src/reporting/console.rs
//! Terminal rendering. Units are listed by ranking; suspicious ones get a
//! source snippet and their factor breakdown, benign ones a single line.

use std::fmt::Write;

use anyhow::Result;
use colored::Colorize;

use super::shared::{level_label, pluralize, score, severity_marker, tag_label};
use super::{FileReport, ScanSummary};
use crate::graph::Severity;
use crate::report::AnalysisReport;
use crate::types::CodeUnit;

/// Lines of source shown under a suspicious unit.
const SNIPPET_LINES: usize = 2;

/// Prints the summary to stdout.
///
/// # Errors
/// Returns error if formatting fails.
pub fn print_report(summary: &ScanSummary) -> Result<()> {
    print!("{}", format_report_string(summary)?);
    Ok(())
}

/// # Errors
/// Returns error if formatting fails.
pub fn format_report_string(summary: &ScanSummary) -> Result<String> {
    let mut out = String::new();
    for file in &summary.files {
        write_file(&mut out, file)?;
    }
    write_summary(&mut out, summary)?;
    Ok(out)
}

fn write_file(out: &mut String, file: &FileReport) -> std::fmt::Result {
    let r = &file.report;
    let level = crate::types::RiskLevel::from_score(r.overall_risk);
    writeln!(
        out,
        "{} {} ({} {}, overall {} {}, confidence {:.2})",
        "==".blue(),
        file.path.display().to_string().bold(),
        r.units.len(),
        pluralize("unit", r.units.len()),
        score(r.overall_risk),
        level_label(level),
        r.confidence
    )?;

    for entry in &r.ranking {
        if let Some(unit) = r.unit(&entry.unit_id) {
            write_unit(out, r, unit, &file.source)?;
        }
    }
    for skipped in &r.skipped {
        writeln!(
            out,
            "   {} {}: {}",
            "SKIPPED".yellow().bold(),
            skipped.unit_id,
            skipped.reason
        )?;
    }
    for pair in &r.skipped_pairs {
        writeln!(
            out,
            "   {} {} <-> {}: {}",
            "SKIPPED".yellow(),
            pair.unit_a,
            pair.unit_b,
            pair.reason
        )?;
    }
    if r.capped_pairs > 0 {
        writeln!(
            out,
            "   {} {} correlation {} over the pairwise cap",
            "CAPPED".yellow(),
            r.capped_pairs,
            pluralize("job", r.capped_pairs)
        )?;
    }
    for err in &r.parse_errors {
        writeln!(out, "   {} {}", "PARSE".red(), err)?;
    }
    writeln!(out)
}

fn write_unit(
    out: &mut String,
    r: &AnalysisReport,
    unit: &CodeUnit,
    source: &str,
) -> std::fmt::Result {
    let Some(s) = r.score(&unit.id) else {
        return Ok(());
    };
    let severity = r
        .graph
        .node(&unit.id)
        .map_or(Severity::Nominal, |n| n.severity);

    writeln!(
        out,
        "{} {} [{}] {} {} conf {:.2} {}",
        severity_marker(severity),
        unit.id.bold(),
        tag_label(unit.tag),
        score(s.value),
        level_label(s.level),
        s.confidence,
        format!("L{}-{}", unit.span.start_line, unit.span.end_line).dimmed()
    )?;
    if unit.tag.is_benign() {
        return Ok(());
    }

    if let Some(rule) = &unit.rule {
        writeln!(out, "   {} {}", "rule:".cyan(), rule)?;
    }
    write_snippet(out, source, unit.span.start_line)?;

    let factors: Vec<String> = s
        .contributing_factors
        .iter()
        .map(|f| format!("{} {}", f.name, score(f.contribution)))
        .collect();
    writeln!(out, "   {} {}", "=".blue(), factors.join("  ").dimmed())?;

    for edge in r.correlations.iter().filter(|e| e.involves(&unit.id)) {
        if let Some(other) = edge.other(&unit.id) {
            writeln!(
                out,
                "   {} correlated with {} (strength {:.2}, {:.2} bits)",
                "~".magenta(),
                other,
                edge.strength,
                edge.mutual_information
            )?;
        }
    }
    Ok(())
}

fn write_snippet(out: &mut String, source: &str, start_line: usize) -> std::fmt::Result {
    let idx = start_line.saturating_sub(1);
    for (i, line) in source.lines().enumerate().skip(idx).take(SNIPPET_LINES) {
        let gutter = format!("{:3} |", i + 1);
        writeln!(out, "   {} {}", gutter.blue(), line)?;
    }
    Ok(())
}

fn write_summary(out: &mut String, summary: &ScanSummary) -> std::fmt::Result {
    let files = summary.files.len();
    let units = summary.unit_count();
    let level = crate::types::RiskLevel::from_score(summary.overall_risk);
    let counts = format!(
        "{files} {}, {units} {}",
        pluralize("file", files),
        pluralize("unit", units)
    );

    if summary.overall_risk > 0.5 {
        write!(out, "{} qtrace analyzed {counts}: overall risk ", "X".red().bold())?;
    } else if summary.overall_risk > 0.3 {
        write!(out, "{} qtrace analyzed {counts}: overall risk ", "~".yellow().bold())?;
    } else {
        write!(out, "{} qtrace analyzed {counts}: overall risk ", "OK".green().bold())?;
    }
    write!(out, "{} ({})", score(summary.overall_risk), level_label(level))?;
    if summary.degraded {
        write!(out, " {}", "[degraded]".yellow())?;
    }
    writeln!(out)
}
