//! Integration tests for building a session context from a config file
//!
//! Runs in its own process: `init_logging` installs the global subscriber,
//! so only one test here may call it.

use mrva_common::config::ConfigResolver;
use mrva_engine::{EngineError, SessionContext};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, content).expect("write temp config");
    path
}

#[test]
fn test_from_resolver_applies_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        "[events]\ncapacity = 8\n\n[display]\nskipped_repositories_limit = 3\n",
    );

    let context = SessionContext::from_resolver(&ConfigResolver::new(Some(path))).unwrap();

    assert_eq!(context.event_bus().capacity(), 8);
    assert_eq!(context.config().display.skipped_repositories_limit, Some(3));
}

#[test]
fn test_from_resolver_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[events]\ncapacity = 0\n");

    let result = SessionContext::from_resolver(&ConfigResolver::new(Some(path)));

    assert!(matches!(result, Err(EngineError::Common(_))));
}

#[test]
fn test_init_logging_appends_to_configured_file() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("session.log");
    let config_path = write_config(
        dir.path(),
        &format!(
            "[logging]\nlevel = \"info\"\nfile = '{}'\n",
            log_path.display()
        ),
    );
    let context = SessionContext::from_resolver(&ConfigResolver::new(Some(config_path))).unwrap();

    context.init_logging().unwrap();
    tracing::info!("first line after init");
    tracing::debug!("below the configured level");

    let written = fs::read_to_string(&log_path).unwrap();
    // RUST_LOG overrides the configured level
    if std::env::var("RUST_LOG").is_err() {
        assert!(written.contains("Session logging initialized"));
        assert!(written.contains("first line after init"));
        assert!(!written.contains("below the configured level"));
    }
    assert!(!written.contains("\u{1b}["));

    // A second subscriber cannot be installed
    assert!(context.init_logging().is_err());
}
