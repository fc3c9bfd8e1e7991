//! JSON configuration loading.
//!
//! ```sh
//! cargo test -p stagehand-runtime --features config-file --test config_file
//! ```

#![cfg(feature = "config-file")]

use std::io::Write;
use std::time::Duration;

use pretty_assertions::assert_eq;
use stagehand_runtime::{ConfigError, EngineConfig, RevealTrigger, Timings};
use tempfile::NamedTempFile;

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(json.as_bytes()).expect("write config");
    file.flush().expect("flush");
    file
}

#[test]
fn partial_file_keeps_defaults() {
    let file = write_config(
        r#"{
            "max_cycles": 5,
            "reveal_trigger": "cycles-exhausted",
            "timings": { "type_interval": 80, "outcome_hold": 3000 }
        }"#,
    );
    let config = EngineConfig::load_json(file.path()).expect("load");

    let expected = EngineConfig::default()
        .with_max_cycles(5)
        .with_reveal_trigger(RevealTrigger::OnCycleBudgetExhausted)
        .with_timings(Timings {
            type_interval: Duration::from_millis(80),
            outcome_hold: Duration::from_millis(3000),
            ..Timings::default()
        });
    assert_eq!(config, expected);
}

#[test]
fn empty_object_is_default() {
    let file = write_config("{}");
    assert_eq!(
        EngineConfig::load_json(file.path()).expect("load"),
        EngineConfig::default()
    );
}

#[test]
fn saved_config_loads_back() {
    let config = EngineConfig::default()
        .with_max_cycles(2)
        .with_hotspot_offset(8.0);
    let file = write_config(&serde_json::to_string_pretty(&config).expect("serialize"));
    assert_eq!(EngineConfig::load_json(file.path()).expect("load"), config);
}

#[test]
fn malformed_json_is_parse_error() {
    let file = write_config("{ max_cycles: 5 ");
    let err = EngineConfig::load_json(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "got {err:?}");
}

#[test]
fn invalid_values_fail_validation() {
    let file = write_config(r#"{ "max_cycles": 0 }"#);
    let err = EngineConfig::load_json(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { .. }), "got {err:?}");
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = EngineConfig::load_json(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
    assert!(std::error::Error::source(&err).is_some());
}
