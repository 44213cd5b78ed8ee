use std::fs;

use qtrace_core::config::Config;
use qtrace_core::error::QtraceError;
use qtrace_core::scanner::predicates::Predicate;
use qtrace_core::types::Tag;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("failed to write fixture");
    path
}

#[test]
fn loads_options_weights_and_relative_rule_file() {
    let dir = TempDir::new().expect("failed to create temp dir");
    write(
        &dir,
        "rules.toml",
        r#"
[[rule]]
tag = "AntiDebug"
match = "debugger-probe"
weight = 0.6

[[rule]]
tag = "ChainedLogic"
match = "flag-chain(2)"
weight = 0.5
"#,
    );
    let path = write(
        &dir,
        "qtrace.toml",
        r#"
rules = "rules.toml"

[analysis]
max_qubits = 16
shots = 512
entanglement_threshold = 0.25

[weights]
benign = 0.05

[weights.overall]
mean = 0.3
peak = 0.6
correlation = 0.1
"#,
    );

    let config = Config::from_file(&path).expect("config should load");
    assert_eq!(config.analysis.max_qubits, 16);
    assert_eq!(config.analysis.shots, 512);
    assert_eq!(config.analysis.exact_qubit_limit, 12);
    assert_eq!(config.weights.benign, 0.05);
    assert_eq!(config.weights.overall.peak, 0.6);
    assert_eq!(config.rules.rules().len(), 2);
    assert_eq!(config.rules.rules()[0].tag, Tag::AntiDebug);
    assert_eq!(
        config.rules.rules()[1].predicate,
        Predicate::FlagChain { min_flags: 2 }
    );
}

#[test]
fn out_of_range_options_are_config_errors() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = write(&dir, "qtrace.toml", "[analysis]\nmax_qubits = 40\n");
    assert!(matches!(Config::from_file(&path), Err(QtraceError::Config(_))));

    let path = write(&dir, "qtrace.toml", "[weights]\nentropy = 1.5\n");
    assert!(matches!(Config::from_file(&path), Err(QtraceError::Config(_))));

    let path = write(
        &dir,
        "qtrace.toml",
        "[analysis]\nmax_qubits = 8\nexact_qubit_limit = 10\n",
    );
    assert!(matches!(Config::from_file(&path), Err(QtraceError::Config(_))));
}

#[test]
fn broken_rule_file_is_rejected() {
    let dir = TempDir::new().expect("failed to create temp dir");
    write(
        &dir,
        "rules.toml",
        "[[rule]]\ntag = \"Rootkit\"\nmatch = \"debugger-probe\"\nweight = 0.5\n",
    );
    let path = write(&dir, "qtrace.toml", "rules = \"rules.toml\"\n");
    assert!(matches!(Config::from_file(&path), Err(QtraceError::Config(_))));

    let missing = write(&dir, "other.toml", "rules = \"absent.toml\"\n");
    assert!(matches!(
        Config::from_file(&missing),
        Err(QtraceError::Io { .. })
    ));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = write(&dir, "qtrace.toml", "[analysis\nshots = 1\n");
    assert!(matches!(Config::from_file(&path), Err(QtraceError::Toml(_))));
}
