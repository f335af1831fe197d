//! Config Tests
//!
//! `Config::load` layers an optional TOML file over `VAGUE_`-prefixed
//! environment variables over built-in defaults, and a narrow retry cap
//! actually changes generator behavior (constraint retries give up sooner).

use std::io::Write;
use vague::{compile, Config, Seed, Warning};

#[test]
fn defaults_load_with_no_file_or_env() {
    let config = Config::load(None).expect("defaults load");
    assert_eq!(config.retries.constraint, 100);
    assert_eq!(config.retries.unique_value, 100);
    assert_eq!(config.defaults.int_min, -1_000_000);
}

#[test]
fn toml_file_overrides_defaults() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[retries]\nconstraint = 5\n").expect("write");

    let config = Config::load(file.path().to_str()).expect("load");
    assert_eq!(config.retries.constraint, 5);
    assert_eq!(config.retries.unique_value, 100);
}

#[test]
fn narrow_constraint_retry_cap_emits_retry_limit_warning() {
    let mut config = Config::default();
    config.retries.constraint = 2;

    let source = "schema P { x: int in 1..100\n assume x > 99999 }\ndataset D { items: 3 of P }\n";
    let output = compile(source, Seed::Value(0), config, &Default::default()).expect("compile");

    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::ConstraintRetryLimit { attempts: 2, .. })));
}
