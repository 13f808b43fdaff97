//! Session options and their layered resolution.
//!
//! Options are resolved once, when a session is created, in this order:
//! 1. Explicit [`SessionOptions`]
//! 2. A [`SessionDefaults`] snapshot (the process-wide one unless passed in)
//! 3. Built-in defaults
//!
//! The process-wide defaults are an immutable snapshot. Replacing them with
//! [`SessionDefaults::set_global`] never affects sessions that already exist.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::id::{IdGenerator, SharedIdGenerator, UuidGenerator};
use super::storage::Storage;
use crate::shell::{SetOptions, Shell, ShellKind};

/// Callback receiving `(line number, raw line)` for every forwarded line.
pub type OutputFn = Arc<dyn Fn(usize, &[u8]) + Send + Sync>;

static GLOBAL_DEFAULTS: RwLock<Option<Arc<SessionDefaults>>> = RwLock::new(None);

/// Writes each line to the process's stderr.
pub fn stderr_output() -> OutputFn {
    Arc::new(|_num, line| {
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line);
        let _ = err.write_all(b"\n");
    })
}

/// Default values for every session option.
#[derive(Clone)]
pub struct SessionDefaults {
    /// Generator for public session ids.
    pub id_generator: SharedIdGenerator,
    /// Shell to launch.
    pub shell: Shell,
    /// Command stream storage, `None` to pipe commands to stdin.
    pub storage: Option<Storage>,
    /// User to run the shell as.
    pub user: Option<String>,
    /// Initial working directory of the shell.
    pub work_dir: Option<PathBuf>,
    /// Output callback.
    pub output: OutputFn,
    /// Deadline for a run.
    pub timeout: Option<Duration>,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            id_generator: Arc::new(UuidGenerator),
            shell: Shell::new(ShellKind::Bash).with_set(SetOptions::EX_PIPEFAIL),
            storage: None,
            user: None,
            work_dir: None,
            output: stderr_output(),
            timeout: None,
        }
    }
}

impl fmt::Debug for SessionDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDefaults")
            .field("shell", &self.shell)
            .field("storage", &self.storage)
            .field("user", &self.user)
            .field("work_dir", &self.work_dir)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SessionDefaults {
    /// The current process-wide defaults.
    pub fn global() -> Arc<SessionDefaults> {
        let guard = GLOBAL_DEFAULTS
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone().unwrap_or_default()
    }

    /// Replace the process-wide defaults.
    pub fn set_global(defaults: SessionDefaults) {
        let mut guard = GLOBAL_DEFAULTS
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Arc::new(defaults));
    }

    /// Restore the built-in process-wide defaults.
    pub fn reset_global() {
        let mut guard = GLOBAL_DEFAULTS
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }
}

/// Explicit per-session options. Unset fields fall back to the defaults.
#[derive(Clone, Default)]
pub struct SessionOptions {
    id_generator: Option<SharedIdGenerator>,
    shell: Option<Shell>,
    storage: Option<Storage>,
    user: Option<String>,
    work_dir: Option<PathBuf>,
    output: Option<OutputFn>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("custom_id_generator", &self.id_generator.is_some())
            .field("shell", &self.shell)
            .field("storage", &self.storage)
            .field("user", &self.user)
            .field("work_dir", &self.work_dir)
            .field("custom_output", &self.output.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SessionOptions {
    /// Options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the id generator.
    pub fn id_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    /// Set the shell.
    pub fn shell(mut self, shell: Shell) -> Self {
        self.shell = Some(shell);
        self
    }

    /// Store the command stream on disk.
    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Run the shell as `user`.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Start the shell in `dir`.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Receive forwarded output lines.
    pub fn output<F>(mut self, output: F) -> Self
    where
        F: Fn(usize, &[u8]) + Send + Sync + 'static,
    {
        self.output = Some(Arc::new(output));
        self
    }

    /// Cancel the run once `timeout` has elapsed.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cancel the run when `token` is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Layer these options over `defaults`.
    pub fn resolve(self, defaults: &SessionDefaults) -> ResolvedOptions {
        let non_empty = |s: String| (!s.trim().is_empty()).then_some(s);
        let non_empty_path = |p: PathBuf| (!p.as_os_str().is_empty()).then_some(p);

        ResolvedOptions {
            id_generator: self
                .id_generator
                .unwrap_or_else(|| Arc::clone(&defaults.id_generator)),
            shell: self.shell.unwrap_or(defaults.shell),
            storage: self
                .storage
                .or_else(|| defaults.storage.clone())
                .filter(Storage::is_enabled),
            user: self
                .user
                .and_then(non_empty)
                .or_else(|| defaults.user.clone().and_then(non_empty)),
            work_dir: self
                .work_dir
                .and_then(non_empty_path)
                .or_else(|| defaults.work_dir.clone().and_then(non_empty_path)),
            output: self.output.unwrap_or_else(|| Arc::clone(&defaults.output)),
            timeout: self.timeout.or(defaults.timeout),
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}

/// Fully resolved options of one session.
#[derive(Clone)]
pub struct ResolvedOptions {
    /// Generator for the public id.
    pub id_generator: SharedIdGenerator,
    /// Shell to launch.
    pub shell: Shell,
    /// Enabled storage, if any.
    pub storage: Option<Storage>,
    /// User to run as.
    pub user: Option<String>,
    /// Initial working directory.
    pub work_dir: Option<PathBuf>,
    /// Output callback.
    pub output: OutputFn,
    /// Run deadline.
    pub timeout: Option<Duration>,
    /// Caller cancellation.
    pub cancel: CancellationToken,
}

impl fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("shell", &self.shell)
            .field("storage", &self.storage)
            .field("user", &self.user)
            .field("work_dir", &self.work_dir)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
