//! Identical `(source, config)` must give byte-identical serialized reports.

use qtrace_core::config::AnalysisConfig;

const SOURCE: &str = r#"
import base64, random, sys

counter = 0
cache = {}

def inc_a():
    global counter
    counter += 1

def inc_b():
    global counter
    counter += 1
    cache["b"] = counter

def read_cache():
    return cache.get("b")

def lottery():
    if random.random() < 0.001:
        inc_a()

def guarded(admin, armed, night):
    if admin and armed:
        if night:
            os.system("rm -rf /tmp/x")

if sys.gettrace() is not None:
    exit(1)

exec(base64.b64decode("cHJpbnQoMSk="))
"#;

fn report_json(config: &AnalysisConfig) -> String {
    qtrace_core::submit(SOURCE, config)
        .expect("submit failed")
        .to_json()
        .expect("serialization failed")
}

#[test]
fn exact_backend_is_byte_identical() {
    let config = AnalysisConfig::default();
    let first = report_json(&config);
    for _ in 0..3 {
        assert_eq!(report_json(&config), first);
    }
}

#[test]
fn sampled_backend_is_byte_identical() {
    let config = AnalysisConfig {
        exact_qubit_limit: 2,
        shots: 256,
        ..AnalysisConfig::default()
    };
    let first = report_json(&config);
    assert_eq!(report_json(&config), first);
    // 1 - 1/sqrt(256)
    assert!(first.contains("0.9375"));
}

#[test]
fn seed_leaves_extraction_untouched() {
    let base = AnalysisConfig {
        exact_qubit_limit: 2,
        shots: 64,
        ..AnalysisConfig::default()
    };
    let reseeded = AnalysisConfig {
        seed: 1,
        ..base.clone()
    };
    let a = qtrace_core::submit(SOURCE, &base).expect("submit failed");
    let b = qtrace_core::submit(SOURCE, &reseeded).expect("submit failed");
    assert_eq!(a.units, b.units);
    assert_eq!(a.parse_errors, b.parse_errors);
}

#[test]
fn report_carries_no_wall_clock_fields() {
    let json = report_json(&AnalysisConfig::default());
    for key in ["duration", "elapsed", "timestamp"] {
        assert!(!json.contains(key), "report mentions {key}");
    }
}
