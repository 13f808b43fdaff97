//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

use shell_batch::cli::{parse_args_from, Args};
use shell_batch::config::Config;
use shell_batch::{SetOptions, ShellKind, Storage};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("shell-batch")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.shell.is_none());
    assert!(result.user.is_none());
    assert!(result.work_dir.is_none());
    assert!(result.storage_dir.is_none());
    assert!(result.timeout_secs.is_none());
    assert!(result.config.is_none());
    assert!(result.commands.is_empty());
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-s",
        "sh",
        "-u",
        "nobody",
        "-d",
        "/srv",
        "--storage-dir",
        "/var/tmp",
        "--keep-script",
        "-t",
        "60",
        "-l",
        "debug",
        "echo one",
        "echo two",
    ]))
    .unwrap();

    assert_eq!(result.shell.as_deref(), Some("sh"));
    assert_eq!(result.user.as_deref(), Some("nobody"));
    assert_eq!(result.work_dir, Some(PathBuf::from("/srv")));
    assert_eq!(result.storage_dir, Some(PathBuf::from("/var/tmp")));
    assert!(result.keep_script);
    assert_eq!(result.timeout_secs, Some(60));
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert_eq!(result.commands, vec!["echo one", "echo two"]);
}

#[test]
fn test_cli_config_file() {
    let result = parse_args_from(args(&["-c", "/etc/shell-batch.json"])).unwrap();

    assert!(result.config.is_some());
    assert_eq!(
        result.config.unwrap().to_str().unwrap(),
        "/etc/shell-batch.json"
    );
}

#[test]
fn test_cli_invalid_timeout() {
    let result = parse_args_from(args(&["-t", "not-a-number"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_stdin_script() {
    let result = parse_args_from(args(&["-s", "sh", "-"])).unwrap();
    assert!(result.reads_stdin());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let file = config_file(
        r#"{
        "shell": {
            "kind": "bash",
            "set": ["errexit", "pipefail"],
            "unset": ["emacs"]
        },
        "storage": {
            "dir": "/var/tmp",
            "keep": true
        },
        "session": {
            "user": "nobody",
            "work_dir": "/srv",
            "timeout_secs": 120
        },
        "logging": {
            "level": "debug"
        }
    }"#,
    );

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.shell.kind, "bash");
    assert_eq!(config.shell.set.len(), 2);
    assert_eq!(config.storage.dir, Some(PathBuf::from("/var/tmp")));
    assert!(config.storage.keep);
    assert_eq!(config.session.user.as_deref(), Some("nobody"));
    assert_eq!(config.session.timeout_secs, Some(120));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_priority_cli_over_file() {
    let file = config_file(
        r#"{
        "shell": { "kind": "bash" },
        "session": { "work_dir": "/srv", "timeout_secs": 10 }
    }"#,
    );

    let args = Args {
        shell: Some("sh".to_string()),
        timeout_secs: Some(99),
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    // CLI values should win, file values fill the rest
    assert_eq!(config.shell.kind, "sh");
    assert_eq!(config.session.timeout_secs, Some(99));
    assert_eq!(config.session.work_dir, Some(PathBuf::from("/srv")));
}

#[test]
fn test_config_missing_file() {
    let args = Args {
        config: Some(PathBuf::from("/nonexistent/shell-batch.json")),
        ..Args::default()
    };
    assert!(Config::load(&args).is_err());
}

#[test]
fn test_config_to_defaults() {
    let args = Args {
        storage_dir: Some(PathBuf::from("/var/tmp")),
        keep_script: true,
        timeout_secs: Some(5),
        ..Args::default()
    };

    let mut config = Config::default();
    config.apply_args(&args);
    let defaults = config.to_defaults().unwrap();

    assert_eq!(defaults.shell.kind, ShellKind::Bash);
    assert_eq!(defaults.shell.set, SetOptions::EX_PIPEFAIL);
    assert_eq!(defaults.storage, Some(Storage::new("/var/tmp").keep(true)));
    assert_eq!(defaults.timeout, Some(Duration::from_secs(5)));
}

#[test]
fn test_config_rejects_unknown_shell() {
    let mut config = Config::default();
    config.apply_args(&Args {
        shell: Some("zsh".to_string()),
        ..Args::default()
    });
    assert!(config.to_defaults().is_err());
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let original = Config::default();
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.shell.kind, loaded.shell.kind);
    assert_eq!(original.shell.set, loaded.shell.set);
}

#[test]
fn test_config_partial_deserialization() {
    // Only specify some fields, others should use defaults
    let json = r#"{"storage": {"keep": true}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert!(config.storage.keep);
    assert!(config.storage.dir.is_none());
    assert_eq!(config.shell.kind, "bash"); // Default
    assert_eq!(config.logging.level, "info"); // Default
}
