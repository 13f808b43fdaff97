//! Configuration management for shell-batch.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::session::{SessionDefaults, Storage};
use crate::shell::{SetOptions, Shell, ShellKind};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell configuration.
    pub shell: ShellSection,
    /// Script storage configuration.
    pub storage: StorageSection,
    /// Session configuration.
    pub session: SessionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Shell configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    /// Shell variant (`bash` or `sh`).
    pub kind: String,
    /// Option names to enable.
    pub set: Vec<String>,
    /// Option names to disable.
    pub unset: Vec<String>,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            kind: "bash".to_string(),
            set: vec![
                "errexit".to_string(),
                "xtrace".to_string(),
                "pipefail".to_string(),
            ],
            unset: Vec::new(),
        }
    }
}

/// Script storage section. An empty directory pipes commands to stdin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory for script files.
    pub dir: Option<PathBuf>,
    /// Keep scripts after the run.
    pub keep: bool,
}

/// Session configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// User to run the shell as.
    pub user: Option<String>,
    /// Initial working directory.
    pub work_dir: Option<PathBuf>,
    /// Run deadline in seconds.
    pub timeout_secs: Option<u64>,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Some(kind) = non_empty_env("SHELL_BATCH_SHELL") {
            self.shell.kind = kind;
        }

        if let Some(user) = non_empty_env("SHELL_BATCH_USER") {
            self.session.user = Some(user);
        }

        if let Some(dir) = non_empty_env("SHELL_BATCH_WORK_DIR") {
            self.session.work_dir = Some(dir.into());
        }

        if let Some(dir) = non_empty_env("SHELL_BATCH_STORAGE_DIR") {
            self.storage.dir = Some(dir.into());
        }

        if let Some(level) = non_empty_env("SHELL_BATCH_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = non_empty_env("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref kind) = args.shell {
            self.shell.kind = kind.clone();
        }

        if let Some(ref user) = args.user {
            self.session.user = Some(user.clone());
        }

        if let Some(ref dir) = args.work_dir {
            self.session.work_dir = Some(dir.clone());
        }

        if let Some(ref dir) = args.storage_dir {
            self.storage.dir = Some(dir.clone());
        }

        if args.keep_script {
            self.storage.keep = true;
        }

        if let Some(secs) = args.timeout_secs {
            self.session.timeout_secs = Some(secs);
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Resolve the shell section.
    pub fn to_shell(&self) -> Result<Shell, ConfigError> {
        let kind: ShellKind = self.shell.kind.parse().map_err(ConfigError::InvalidShell)?;
        let set = SetOptions::from_names(&self.shell.set).map_err(ConfigError::InvalidOption)?;
        let unset =
            SetOptions::from_names(&self.shell.unset).map_err(ConfigError::InvalidOption)?;
        Ok(Shell::new(kind).with_set(set).with_unset(unset))
    }

    /// Build a session defaults snapshot from this configuration.
    pub fn to_defaults(&self) -> Result<SessionDefaults, ConfigError> {
        let storage = self
            .storage
            .dir
            .as_ref()
            .map(|dir| Storage::new(dir).keep(self.storage.keep))
            .filter(Storage::is_enabled);

        Ok(SessionDefaults {
            shell: self.to_shell()?,
            storage,
            user: self.session.user.clone(),
            work_dir: self.session.work_dir.clone(),
            timeout: self
                .session
                .timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            ..SessionDefaults::default()
        })
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Unknown shell variant.
    InvalidShell(String),
    /// Unknown shell option name.
    InvalidOption(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidShell(kind) => write!(f, "unknown shell: {}", kind),
            Self::InvalidOption(name) => write!(f, "unknown shell option: {}", name),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.shell.kind, "bash");
        assert!(config.storage.dir.is_none());
        assert!(!config.storage.keep);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_shell_matches_session_default() {
        let shell = Config::default().to_shell().unwrap();
        assert_eq!(shell, SessionDefaults::default().shell);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "shell": {
                "kind": "sh",
                "set": ["e", "nounset"],
                "unset": ["x"]
            },
            "storage": {
                "dir": "/var/tmp",
                "keep": true
            },
            "session": {
                "user": "nobody",
                "timeout_secs": 30
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        let defaults = config.to_defaults().unwrap();

        assert_eq!(defaults.shell.kind, ShellKind::Sh);
        assert_eq!(defaults.shell.set, SetOptions::ERREXIT | SetOptions::NOUNSET);
        assert_eq!(defaults.shell.unset, SetOptions::XTRACE);
        assert_eq!(defaults.storage, Some(Storage::new("/var/tmp").keep(true)));
        assert_eq!(defaults.user.as_deref(), Some("nobody"));
        assert_eq!(defaults.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{
            "session": {
                "work_dir": "/srv"
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.shell.kind, "bash"); // Default
        assert_eq!(config.session.work_dir, Some(PathBuf::from("/srv")));
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            shell: Some("sh".to_string()),
            user: Some("root".to_string()),
            storage_dir: Some(PathBuf::from("/tmp")),
            keep_script: true,
            timeout_secs: Some(5),
            log_level: Some("debug".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.shell.kind, "sh");
        assert_eq!(config.session.user.as_deref(), Some("root"));
        assert_eq!(config.storage.dir, Some(PathBuf::from("/tmp")));
        assert!(config.storage.keep);
        assert_eq!(config.session.timeout_secs, Some(5));
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_args_leave_unset_fields() {
        let mut config = Config::default();
        config.session.user = Some("nobody".to_string());
        config.apply_args(&Args::default());
        assert_eq!(config.session.user.as_deref(), Some("nobody"));
    }

    #[test]
    fn test_invalid_shell() {
        let mut config = Config::default();
        config.shell.kind = "fish".to_string();
        assert!(matches!(
            config.to_defaults(),
            Err(ConfigError::InvalidShell(_))
        ));
    }

    #[test]
    fn test_invalid_option() {
        let mut config = Config::default();
        config.shell.set.push("bogus".to_string());
        match config.to_defaults() {
            Err(ConfigError::InvalidOption(name)) => assert_eq!(name, "bogus"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_zero_timeout_disables() {
        let mut config = Config::default();
        config.session.timeout_secs = Some(0);
        assert!(config.to_defaults().unwrap().timeout.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"shell\""));
        assert!(json.contains("\"pipefail\""));
    }
}
