//! Error types for shell-batch.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for shell-batch operations.
#[derive(Error, Debug)]
pub enum ShellBatchError {
    /// Storage directory does not exist.
    #[error("storage directory not found: {0}")]
    StorageNotFound(PathBuf),

    /// Storage path exists but is not a directory.
    #[error("storage path is not a directory: {0}")]
    StorageNotDirectory(PathBuf),

    /// User name could not be resolved to a uid/gid.
    #[error("unknown user: {0}")]
    UserNotFound(String),

    /// The id generator produced an empty id.
    #[error("id generator returned an empty id")]
    EmptyId,

    /// The id cannot be used as a storage file name.
    #[error("invalid session id: {0}")]
    InvalidId(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the shell's output failed.
    #[error("read: {0}")]
    Read(#[source] std::io::Error),

    /// Writing to the command stream failed.
    #[error("write: {0}")]
    Write(#[source] std::io::Error),

    /// The shell could not be started.
    #[error("failed to spawn shell: {0}")]
    Spawn(#[source] std::io::Error),

    /// The shell exited unsuccessfully.
    #[error("{}", exit_message(*code, *signal))]
    ExitStatus {
        /// Exit code, if the shell exited normally.
        code: Option<i32>,
        /// Terminating signal, if the shell was killed.
        signal: Option<i32>,
    },

    /// The session already ran to completion.
    #[error("session already finished")]
    AlreadyFinished,

    /// The session has already been started.
    #[error("session already started")]
    AlreadyStarted,

    /// The run was cancelled by the caller.
    #[error("execution cancelled")]
    Cancelled,

    /// The run exceeded its deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// An error raised while running a session.
    #[error("{source}")]
    Exec {
        /// Public id of the session.
        id: String,
        /// Underlying error.
        #[source]
        source: Box<ShellBatchError>,
    },
}

fn exit_message(code: Option<i32>, signal: Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!("exit status {code}"),
        (None, Some(signal)) => format!("killed by signal {signal}"),
        (None, None) => "exited abnormally".to_string(),
    }
}

impl ShellBatchError {
    /// Wrap an error with the id of the session that raised it.
    pub fn exec(id: impl Into<String>, source: ShellBatchError) -> Self {
        match source {
            already @ ShellBatchError::Exec { .. } => already,
            source => ShellBatchError::Exec {
                id: id.into(),
                source: Box::new(source),
            },
        }
    }

    /// The innermost error, looking through [`ShellBatchError::Exec`].
    pub fn root(&self) -> &ShellBatchError {
        match self {
            ShellBatchError::Exec { source, .. } => source.root(),
            other => other,
        }
    }

    /// Id of the session that raised the error, if known.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            ShellBatchError::Exec { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Whether the run stopped because the caller cancelled it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), ShellBatchError::Cancelled)
    }

    /// Whether the run stopped because its deadline passed.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.root(), ShellBatchError::DeadlineExceeded)
    }

    /// Cancelled or timed out, as opposed to a real shell failure.
    pub fn is_interrupted(&self) -> bool {
        self.is_cancelled() || self.is_deadline_exceeded()
    }
}

/// Convenience Result type for shell-batch operations.
pub type Result<T> = std::result::Result<T, ShellBatchError>;
