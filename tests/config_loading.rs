use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;

use testdrive::config::{RawConfigFile, ServiceConfig, load_and_validate, load_or_default};
use testdrive::errors::TestdriveError;

type TestResult = Result<(), Box<dyn Error>>;

fn toml_file(contents: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{contents}")?;
    Ok(file)
}

#[test]
fn demo_config_loads() -> TestResult {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cfg = load_and_validate(manifest.join("demos/Testdrive.toml"))?;

    assert_eq!(cfg.bind_address(), "0.0.0.0:8080");
    assert_eq!(cfg.server.cors_origins.len(), 2);
    assert_eq!(cfg.executor_limits().max_concurrent_runs, 3);
    assert_eq!(
        cfg.executor_limits().run_timeout,
        Some(Duration::from_secs(600))
    );

    let stream = cfg.stream_settings();
    assert_eq!(stream.poll_interval, Duration::from_millis(250));
    assert_eq!(stream.error_backoff, Duration::from_millis(500));
    assert_eq!(stream.max_errors, 5);
    assert_eq!(cfg.keep_alive(), Duration::from_secs(10));
    assert_eq!(cfg.phase_delay(), Duration::from_millis(1500));

    assert_eq!(cfg.catalog.len(), 2);
    let checkout = cfg.catalog.get("checkout-redesign").ok_or("missing experiment")?;
    assert_eq!(checkout.tags, ["checkout", "a/b"]);
    assert_eq!(checkout.config.estimated_duration, Some(120));
    assert_eq!(checkout.config.parameters["sample_size"], 4000);
    assert!(cfg.catalog.get("bank-portal-migration").is_none());
    Ok(())
}

#[test]
fn empty_file_gives_defaults_and_builtin_catalog() -> TestResult {
    let file = toml_file("")?;
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.bind_address(), "127.0.0.1:8000");
    assert_eq!(cfg.server.cors_origins, ["http://localhost:8501"]);
    assert_eq!(cfg.stream_settings(), testdrive::publish::StreamSettings::default());
    assert_eq!(cfg.keep_alive(), Duration::from_secs(15));
    assert_eq!(cfg.phase_delay(), Duration::from_secs(3));
    assert_eq!(cfg.catalog.len(), 3);
    assert!(cfg.catalog.get("customer-churn-prediction").is_some());
    Ok(())
}

#[test]
fn zero_timeout_disables_it() -> TestResult {
    let file = toml_file("[executor]\nrun_timeout_secs = 0\n")?;
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.executor_limits().run_timeout, None);
    assert_eq!(cfg.executor_limits().max_concurrent_runs, 5);
    Ok(())
}

#[test]
fn missing_default_file_falls_back_to_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let cfg = load_or_default(dir.path().join("Testdrive.toml"))?;

    assert_eq!(cfg.bind_address(), ServiceConfig::default().bind_address());
    assert_eq!(cfg.catalog.len(), 3);
    Ok(())
}

#[test]
fn explicit_missing_file_is_an_io_error() -> TestResult {
    let dir = tempfile::tempdir()?;

    match load_and_validate(dir.path().join("nope.toml")) {
        Err(TestdriveError::IoError(_)) => Ok(()),
        Err(e) => panic!("Expected IoError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn malformed_toml_is_reported() -> TestResult {
    let file = toml_file("[server\nport = 1")?;

    match load_and_validate(file.path()) {
        Err(TestdriveError::TomlError(_)) => Ok(()),
        Err(e) => panic!("Expected TomlError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn zero_concurrency_is_rejected() -> TestResult {
    let file = toml_file("[executor]\nmax_concurrent_runs = 0\n")?;

    match load_and_validate(file.path()) {
        Err(TestdriveError::ConfigError(msg)) => {
            assert!(msg.contains("max_concurrent_runs"));
            Ok(())
        }
        Err(e) => panic!("Expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn zero_stream_intervals_are_rejected() -> TestResult {
    for (key, value) in [
        ("poll_interval_ms", 0),
        ("error_backoff_ms", 0),
        ("max_errors", 0),
        ("keep_alive_secs", 0),
    ] {
        let file = toml_file(&format!("[stream]\n{key} = {value}\n"))?;
        match load_and_validate(file.path()) {
            Err(TestdriveError::ConfigError(msg)) => assert!(msg.contains(key), "{msg}"),
            Err(e) => panic!("Expected ConfigError for {key}, got: {e:?}"),
            Ok(_) => panic!("Expected error for {key}, got Ok"),
        }
    }
    Ok(())
}

#[test]
fn duplicate_experiment_ids_are_rejected() -> TestResult {
    let experiment = r#"
[[experiment]]
id = "dup"
name = "Dup"
description = "d"
category = "c"
config = { name = "n", description = "d" }
"#;
    let file = toml_file(&format!("{experiment}{experiment}"))?;

    match load_and_validate(file.path()) {
        Err(TestdriveError::ConfigError(msg)) => {
            assert!(msg.contains("dup"));
            assert!(msg.contains("more than once"));
            Ok(())
        }
        Err(e) => panic!("Expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn validation_runs_through_try_from() {
    let mut raw = RawConfigFile::default();
    raw.server.host = "  ".to_string();

    let err = ServiceConfig::try_from(raw).unwrap_err();
    assert!(matches!(err, TestdriveError::ConfigError(msg) if msg.contains("host")));

    let mut raw = RawConfigFile::default();
    raw.server.port = 0;
    let err = ServiceConfig::try_from(raw).unwrap_err();
    assert!(matches!(err, TestdriveError::ConfigError(msg) if msg.contains("port")));
}
