//! End-to-end scenarios through `submit()`.

use qtrace_core::analysis::Engine;
use qtrace_core::circuit::CircuitSpec;
use qtrace_core::config::AnalysisConfig;
use qtrace_core::simulator::{
    SimulationError, SimulationResult, SimulatorPort, StatevectorSimulator,
};
use qtrace_core::types::{CodeUnit, Complexity, RiskLevel, Tag};

const SHARED_COUNTER: &str = "\
counter = 0

def inc_a():
    global counter
    counter += 1

def inc_b():
    global counter
    counter += 1
";

const BOMB: &str = "if current_date == \"2038-01-19\":\n    detonate()\n";

/// A `counter` writer with `branches` sequential `if` arms.
fn branchy_writer(name: &str, branches: usize) -> String {
    let mut out = format!("def {name}(x):\n    global counter\n    counter += 1\n");
    for i in 0..branches {
        out.push_str(&format!("    if x == {i}:\n        return {i}\n"));
    }
    out
}

fn synthetic(id: &str, branches: usize) -> CodeUnit {
    CodeUnit::synthetic(
        id,
        Tag::ChainedLogic,
        Complexity {
            branches,
            boolean_ops: 1,
            max_depth: 1,
        },
    )
}

/// Times out every circuit wider than `narrow_limit` qubits.
struct WideCircuitsTimeOut {
    narrow_limit: usize,
    normal: StatevectorSimulator,
    expired: StatevectorSimulator,
}

impl WideCircuitsTimeOut {
    fn new(narrow_limit: usize) -> Self {
        let config = AnalysisConfig::default();
        let expired = AnalysisConfig {
            timeout_ms: 0,
            ..AnalysisConfig::default()
        };
        Self {
            narrow_limit,
            normal: StatevectorSimulator::from_config(&config),
            expired: StatevectorSimulator::from_config(&expired),
        }
    }
}

impl SimulatorPort for WideCircuitsTimeOut {
    fn run(&self, spec: &CircuitSpec) -> Result<SimulationResult, SimulationError> {
        if spec.qubit_count > self.narrow_limit {
            self.expired.run(spec)
        } else {
            self.normal.run(spec)
        }
    }
}

#[test]
fn date_trigger_scores_as_probabilistic_bomb() {
    let report = qtrace_core::submit(BOMB, &AnalysisConfig::default()).expect("submit failed");

    assert_eq!(report.units.len(), 1);
    let unit = &report.units[0];
    assert_eq!(unit.tag, Tag::ProbabilisticBomb);
    let score = report.score(&unit.id).expect("unit was not scored");
    assert!(score.value > 0.7, "value {}", score.value);
    assert_eq!(score.level, RiskLevel::Extreme);
    assert!(!report.degraded);
    assert_eq!(report.confidence, 1.0);
    assert_eq!(report.ranking[0].unit_id, unit.id);
}

#[test]
fn shared_counter_writers_are_correlated() {
    let report =
        qtrace_core::submit(SHARED_COUNTER, &AnalysisConfig::default()).expect("submit failed");

    let edge = report.edge("inc_a", "inc_b").expect("no correlation edge");
    assert!(edge.strength > 0.3, "strength {}", edge.strength);
    assert_eq!(edge.unit_a, "inc_a");
    assert_eq!(report.edge("inc_b", "inc_a"), Some(edge));

    let records = report.records();
    let a = records
        .iter()
        .find(|r| r.unit_id == "inc_a")
        .expect("no record");
    assert_eq!(a.correlations.len(), 1);
    assert_eq!(a.correlations[0].unit_id, "inc_b");
}

#[test]
fn oversized_unit_is_skipped_alone() {
    let huge = CodeUnit::synthetic(
        "huge",
        Tag::ChainedLogic,
        Complexity {
            branches: 1 << 26,
            boolean_ops: 0,
            max_depth: 1,
        },
    );
    let small = CodeUnit::synthetic(
        "small",
        Tag::ProbabilisticBomb,
        Complexity {
            branches: 1,
            boolean_ops: 0,
            max_depth: 1,
        },
    );
    let config = AnalysisConfig::default();
    let sim = StatevectorSimulator::from_config(&config);
    let report = Engine::default()
        .analyze_units(vec![huge, small], &config, &sim)
        .expect("analysis failed");

    assert_eq!(
        report.skipped_reason("huge"),
        Some(&SimulationError::Overflow {
            qubits: 30,
            limit: 20
        })
    );
    assert!(report.score("small").is_some());
    assert!(report.score("huge").is_none());
    assert!(report.degraded);
    assert!((report.confidence - 0.85).abs() < 1e-12);

    let record = report
        .records()
        .into_iter()
        .find(|r| r.unit_id == "huge")
        .expect("no record");
    assert!(record.risk_score.is_none());
    assert!(record.error.is_some());
}

#[test]
fn narrow_qubit_ceiling_skips_branchy_functions() {
    let source = "\
def simple():
    return 1

def branchy(x):
    if x == 1:
        return 1
    if x == 2:
        return 2
    if x == 3:
        return 3
    if x == 4:
        return 4
";
    let config = AnalysisConfig {
        max_qubits: 4,
        exact_qubit_limit: 4,
        ..AnalysisConfig::default()
    };
    let report = qtrace_core::submit(source, &config).expect("submit failed");
    assert!(report.score("simple").is_some());
    assert!(matches!(
        report.skipped_reason("branchy"),
        Some(SimulationError::Overflow { .. })
    ));
    assert!(report.degraded);
}

#[test]
fn malformed_function_only_loses_its_own_span() {
    let source = "\
def good():
    if time.time() > 1900000000:
        wipe()

def bad(:
    return 2

def helper():
    return good()
";
    let report = qtrace_core::submit(source, &AnalysisConfig::default()).expect("submit failed");

    assert_eq!(report.parse_errors.len(), 1);
    let span = report.parse_errors[0].span;
    assert_eq!((span.start_line, span.end_line), (5, 6));
    let ids: Vec<&str> = report.units.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["good", "helper"]);
    assert!(report.score("good").is_some());
    assert!(report.score("helper").is_some());
    assert!(report.degraded);
}

#[test]
fn clean_source_is_not_degraded() {
    let source = "def add(a, b):\n    return a + b\n";
    let report = qtrace_core::submit(source, &AnalysisConfig::default()).expect("submit failed");
    assert!(!report.degraded);
    assert!(report.overall_risk < 0.1);
    assert!(report.correlations.is_empty());
    assert!(report.red_team.is_none());
}

#[test]
fn overflowing_pair_costs_confidence() {
    let source = format!(
        "counter = 0\n\n{}\n{}",
        branchy_writer("inc_a", 200),
        branchy_writer("inc_b", 200)
    );
    let report = qtrace_core::submit(&source, &AnalysisConfig::default()).expect("submit failed");

    assert!(report.score("inc_a").is_some());
    assert!(report.score("inc_b").is_some());
    assert!(report.skipped.is_empty());
    assert_eq!(report.skipped_pairs.len(), 1);
    let pair = &report.skipped_pairs[0];
    assert_eq!((pair.unit_a.as_str(), pair.unit_b.as_str()), ("inc_a", "inc_b"));
    assert_eq!(
        pair.reason,
        SimulationError::Overflow {
            qubits: 24,
            limit: 20
        }
    );
    assert!(report.edge("inc_a", "inc_b").is_none());
    assert!(report.degraded);
    assert!((report.confidence - 0.85).abs() < 1e-12, "confidence {}", report.confidence);
}

#[test]
fn capped_pairs_alone_mark_the_report_degraded() {
    let config = AnalysisConfig {
        max_pairwise_units: 0,
        ..AnalysisConfig::default()
    };
    let report = qtrace_core::submit(SHARED_COUNTER, &config).expect("submit failed");

    assert_eq!(report.capped_pairs, 1);
    assert!(report.correlations.is_empty());
    assert!(report.skipped.is_empty());
    assert!(report.skipped_pairs.is_empty());
    assert!(report.parse_errors.is_empty());
    assert!(report.degraded);
    assert_eq!(report.confidence, 1.0);
}

#[test]
fn zero_budget_skips_every_unit() {
    let config = AnalysisConfig {
        timeout_ms: 0,
        ..AnalysisConfig::default()
    };
    let report = qtrace_core::submit(BOMB, &config).expect("submit failed");

    assert_eq!(report.units.len(), 1);
    assert_eq!(
        report.skipped_reason("if@L1"),
        Some(&SimulationError::Timeout { budget_ms: 0 })
    );
    assert!(report.score("if@L1").is_none());
    assert!(report.degraded);
    assert_eq!(report.confidence, 0.0);
}

#[test]
fn timed_out_unit_costs_confidence() {
    let config = AnalysisConfig::default();
    let sim = WideCircuitsTimeOut::new(5);
    let report = Engine::default()
        .analyze_units(vec![synthetic("slow", 8), synthetic("fast", 1)], &config, &sim)
        .expect("analysis failed");

    assert_eq!(
        report.skipped_reason("slow"),
        Some(&SimulationError::Timeout { budget_ms: 0 })
    );
    assert!(report.score("fast").is_some());
    assert!(report.degraded);
    assert!((report.confidence - 0.85).abs() < 1e-12, "confidence {}", report.confidence);

    let record = report
        .records()
        .into_iter()
        .find(|r| r.unit_id == "slow")
        .expect("no record");
    assert!(record.risk_score.is_none());
    assert!(record.error.is_some());
}

#[test]
fn non_ascii_docstrings_do_not_break_scanning() {
    let source = "def f():\n    \"\"\"Café, résumé\"\"\"\n    return 1\n\ndef g():\n    \"\"\"\n    naïve ☃\n    \"\"\"\n    return f()\n";
    let report = qtrace_core::submit(source, &AnalysisConfig::default()).expect("submit failed");

    assert!(report.parse_errors.is_empty());
    let ids: Vec<&str> = report.units.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["f", "g"]);
    assert!(report.score("g").is_some());
}

#[test]
fn long_or_chain_is_scored() {
    let names: Vec<String> = (0..800).map(|i| format!("flag_{i}")).collect();
    let source = format!("def f():\n    if {}:\n        boom()\n", names.join(" or "));
    let report = qtrace_core::submit(&source, &AnalysisConfig::default()).expect("submit failed");

    assert!(report.parse_errors.is_empty());
    let unit = report.unit("f").expect("no unit");
    assert_eq!(unit.complexity.boolean_ops, 799);
    assert_eq!(unit.complexity.branches, 1);
    assert!(report.score("f").is_some());
}

#[test]
fn pathological_nesting_is_a_parse_error() {
    let depth = 400;
    let source = format!(
        "def ok():\n    return 1\n\nx = {}y{}\n",
        "f(".repeat(depth),
        ")".repeat(depth)
    );
    let report = qtrace_core::submit(&source, &AnalysisConfig::default()).expect("submit failed");

    assert_eq!(report.parse_errors.len(), 1);
    assert_eq!(report.parse_errors[0].span.start_line, 4);
    assert!(report.score("ok").is_some());
    assert!(report.degraded);
}
