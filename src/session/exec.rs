//! A shell session running one batch of commands.

use std::fmt;
use std::io::{BufRead, BufReader, PipeReader, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::id::{CorrelationToken, SessionId};
use super::options::{OutputFn, SessionDefaults, SessionOptions};
use super::process::{self, LaunchSpec};
use super::protocol::{LineEvent, Trailer};
use super::state::SessionState;
use super::storage::Storage;
use crate::error::ShellBatchError;
use crate::Result;

/// How long `run` waits for its I/O tasks after the shell has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mutable session state, shared with the output reader.
#[derive(Debug, Default)]
struct Inner {
    state: SessionState,
    pid: Option<u32>,
    exited: bool,
    work_dir: Option<String>,
    error: Option<ShellBatchError>,
    trailer_len: u64,
}

/// The write end of the command stream.
enum Sink {
    /// Accepting commands ahead of the run.
    Open(Box<dyn Write + Send>),
    /// The batch and trailer have been handed to the shell.
    Sealed,
    /// The session has finished.
    Closed,
}

/// State reachable from both the caller and the output reader.
struct Shared {
    id: SessionId,
    inner: Mutex<Inner>,
    sink: Mutex<Sink>,
    script: Option<(Storage, PathBuf)>,
}

impl Shared {
    /// Record an error. A forced error replaces any earlier one.
    fn record(&self, err: ShellBatchError, force: bool) {
        let mut inner = lock(&self.inner);
        if force || inner.error.is_none() {
            debug!("Session {}: recorded error (forced: {}): {}", self.id, force, err);
            inner.error = Some(err);
        }
    }

    fn set_work_dir(&self, dir: String) {
        let mut inner = lock(&self.inner);
        if inner.work_dir.is_none() {
            inner.work_dir = Some(dir);
        }
    }

    fn write(&self, raw: &[u8]) -> Result<()> {
        if raw.is_empty() {
            return Ok(());
        }
        match &mut *lock(&self.sink) {
            Sink::Open(writer) => write_flush(writer, raw),
            Sink::Sealed => Err(ShellBatchError::AlreadyStarted),
            Sink::Closed => Err(ShellBatchError::AlreadyFinished),
        }
    }

    /// Take the writer for the final batch. Later writes fail.
    fn seal(&self) -> Result<Box<dyn Write + Send>> {
        let mut sink = lock(&self.sink);
        match std::mem::replace(&mut *sink, Sink::Sealed) {
            Sink::Open(writer) => Ok(writer),
            Sink::Sealed => Err(ShellBatchError::AlreadyStarted),
            Sink::Closed => {
                *sink = Sink::Closed;
                Err(ShellBatchError::AlreadyFinished)
            }
        }
    }

    /// The single transition to `Finished`: closes the command stream and
    /// cleans up the script file. Later calls do nothing.
    fn finish(&self) {
        let mut inner = lock(&self.inner);
        if inner.state.transition_to(SessionState::Finished).is_err() {
            return;
        }

        *lock(&self.sink) = Sink::Closed;

        if let Some((storage, path)) = &self.script {
            if let Err(e) = storage.remove_or_truncate(path, inner.trailer_len) {
                warn!(
                    "Session {}: failed to clean up {}: {}",
                    self.id,
                    path.display(),
                    e
                );
            }
        }
        debug!("Session {}: finished", self.id);
    }
}

fn write_flush(writer: &mut Box<dyn Write + Send>, raw: &[u8]) -> Result<()> {
    writer.write_all(raw).map_err(ShellBatchError::Write)?;
    writer.flush().map_err(ShellBatchError::Write)
}

/// Process launch material, consumed by the first `run`.
struct Launch {
    command: Command,
    output: PipeReader,
}

/// A shell process that runs one batch of commands.
///
/// Commands are written to the shell's input (or a script file), followed by
/// a completion trailer. The shell's combined output is forwarded line by
/// line to the output callback, minus the trailer's own lines.
///
/// # Example
///
/// ```no_run
/// use shell_batch::{Session, SessionOptions};
///
/// # async fn demo() -> shell_batch::Result<()> {
/// let session = Session::create(SessionOptions::new().output(|num, line| {
///     println!("{num}: {}", String::from_utf8_lossy(line));
/// }))?;
/// session.add_command("cd", ["/tmp"])?;
/// session.run(["echo hello world"]).await?;
/// assert_eq!(session.last_work_dir().as_deref(), Some("/tmp"));
/// # Ok(())
/// # }
/// ```
pub struct Session {
    shared: Arc<Shared>,
    trailer: Trailer,
    output: OutputFn,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    command_line: String,
    launch: Mutex<Option<Launch>>,
}

impl Session {
    /// Create a session, layering `options` over the process-wide defaults.
    pub fn create(options: SessionOptions) -> Result<Self> {
        Self::create_with_defaults(options, &SessionDefaults::global())
    }

    /// Create a session, layering `options` over `defaults`.
    pub fn create_with_defaults(options: SessionOptions, defaults: &SessionDefaults) -> Result<Self> {
        let opts = options.resolve(defaults);

        let id = opts.id_generator.generate();
        if id.is_empty() {
            return Err(ShellBatchError::EmptyId);
        }
        let id = SessionId::new(id);

        let credentials = opts
            .user
            .as_deref()
            .map(process::lookup_user)
            .transpose()?;

        let mut script = None;
        if let Some(storage) = &opts.storage {
            if storage.check()? {
                if !id.is_file_name() {
                    return Err(ShellBatchError::InvalidId(id.to_string()));
                }
                let (path, file) = storage.create_file(id.as_str())?;
                script = Some((storage.clone(), path, file));
            }
        }

        let program = opts.shell.path();
        let args = opts.shell.args();
        let (stdin, sink, script): (Stdio, Box<dyn Write + Send>, _) = match script {
            Some((storage, path, file)) => (
                Stdio::null(),
                Box::new(file) as Box<dyn Write + Send>,
                Some((storage, path)),
            ),
            None => {
                let (reader, writer) = std::io::pipe()?;
                (Stdio::from(reader), Box::new(writer), None)
            }
        };

        let spec = LaunchSpec {
            program: &program,
            args: &args,
            script: script.as_ref().map(|(_, path): &(Storage, PathBuf)| path.as_path()),
            credentials,
            work_dir: opts.work_dir.as_deref(),
        };
        let (command, output) = process::build_command(&spec, stdin)?;
        let command_line = process::command_line(&spec);

        debug!("Session {}: created: {}", id, command_line);

        Ok(Self {
            shared: Arc::new(Shared {
                id,
                inner: Mutex::new(Inner::default()),
                sink: Mutex::new(Sink::Open(sink)),
                script,
            }),
            trailer: Trailer::new(CorrelationToken::generate()),
            output: opts.output,
            timeout: opts.timeout,
            cancel: opts.cancel.child_token(),
            command_line,
            launch: Mutex::new(Some(Launch { command, output })),
        })
    }

    /// Public session id.
    pub fn id(&self) -> &SessionId {
        &self.shared.id
    }

    /// Whether the batch has completed or been cancelled.
    pub fn is_finished(&self) -> bool {
        lock(&self.shared.inner).state.is_terminal()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        lock(&self.shared.inner).state
    }

    /// Working directory reported by the trailer, once it has run.
    pub fn last_work_dir(&self) -> Option<String> {
        lock(&self.shared.inner).work_dir.clone()
    }

    /// The rendered shell command line.
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Path of the script file when storage is enabled.
    pub fn script_path(&self) -> Option<&Path> {
        self.shared.script.as_ref().map(|(_, path)| path.as_path())
    }

    /// Append `name args...` as one command line. Empty names are ignored.
    pub fn add_command<I, S>(&self, name: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if name.is_empty() {
            return Ok(());
        }
        let mut line = String::from(name);
        for arg in args {
            line.push(' ');
            line.push_str(arg.as_ref());
        }
        let mut raw = line.trim().as_bytes().to_vec();
        raw.push(b'\n');
        self.add_raw_command(&raw)
    }

    /// Append raw bytes to the command stream.
    ///
    /// Only possible before `run`: once the batch and trailer are written,
    /// this fails with [`ShellBatchError::AlreadyStarted`].
    pub fn add_raw_command(&self, raw: &[u8]) -> Result<()> {
        self.shared.write(raw)
    }

    /// Run the batch: start the shell, append `commands` and the trailer,
    /// and wait for the shell to exit.
    ///
    /// A session runs once; running it again fails without side effects.
    pub async fn run<I, S>(&self, commands: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let launch = self.begin().map_err(|e| self.wrap(e))?;
        let commands: Vec<String> = commands
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .collect();

        if let Err(e) = self.drive(launch, &commands).await {
            self.shared.record(e, true);
        }
        self.shared.finish();

        match lock(&self.shared.inner).error.take() {
            Some(e) => Err(self.wrap(e)),
            None => Ok(()),
        }
    }

    /// Kill the shell and its process group, then finish the session.
    ///
    /// Does nothing on a finished session.
    pub fn cancel(&self) -> Result<()> {
        let (state, pid, exited) = {
            let inner = lock(&self.shared.inner);
            (inner.state, inner.pid, inner.exited)
        };
        if state.is_terminal() {
            return Ok(());
        }

        debug!("Session {}: cancelling", self.shared.id);
        self.cancel.cancel();

        let result = match (pid, exited) {
            (Some(pid), false) => process::kill_group(pid).map_err(ShellBatchError::Io),
            _ => Ok(()),
        };
        self.shared.finish();
        result.map_err(|e| self.wrap(e))
    }

    fn wrap(&self, err: ShellBatchError) -> ShellBatchError {
        ShellBatchError::exec(self.shared.id.as_str(), err)
    }

    fn begin(&self) -> Result<Launch> {
        let mut inner = lock(&self.shared.inner);
        if !inner.state.can_transition_to(SessionState::Running) {
            return Err(match inner.state {
                SessionState::Finished => ShellBatchError::AlreadyFinished,
                _ => ShellBatchError::AlreadyStarted,
            });
        }
        let launch = lock(&self.launch)
            .take()
            .ok_or(ShellBatchError::AlreadyStarted)?;
        inner.state.transition_to(SessionState::Running)?;
        Ok(launch)
    }

    /// The extra commands followed by the trailer, and the trailer length.
    fn batch(&self, commands: &[String]) -> (Vec<u8>, u64) {
        let mut batch = Vec::new();
        for command in commands.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
            batch.extend_from_slice(command.as_bytes());
            batch.push(b'\n');
        }
        let trailer = self.trailer.script();
        batch.extend_from_slice(&trailer);
        (batch, trailer.len() as u64)
    }

    async fn drive(&self, launch: Launch, commands: &[String]) -> Result<()> {
        let deadline_at = self.timeout.map(|t| tokio::time::Instant::now() + t);
        if self.cancel.is_cancelled() {
            return Err(ShellBatchError::Cancelled);
        }

        let (batch, trailer_len) = self.batch(commands);
        let mut sink = self.shared.seal()?;

        // A script file must be complete before the shell starts reading it.
        let input = if self.shared.script.is_some() {
            write_flush(&mut sink, &batch)?;
            drop(sink);
            lock(&self.shared.inner).trailer_len = trailer_len;
            None
        } else {
            Some((sink, batch))
        };

        let Launch {
            mut command,
            output,
        } = launch;
        let mut child = command.spawn().map_err(ShellBatchError::Spawn)?;
        // Release the parent's copies of the pipe ends held by the command.
        drop(command);

        let pid = child.id();
        lock(&self.shared.inner).pid = pid;
        debug!("Session {}: spawned pid {:?}", self.shared.id, pid);

        let reader = self.spawn_reader(output);
        let writer = input.map(|(sink, batch)| self.spawn_writer(sink, batch));

        let deadline = async {
            match deadline_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        let status = tokio::select! {
            status = child.wait() => status,
            _ = self.cancel.cancelled() => {
                self.interrupt(&mut child, ShellBatchError::Cancelled).await
            }
            _ = deadline => {
                self.interrupt(&mut child, ShellBatchError::DeadlineExceeded).await
            }
        };
        lock(&self.shared.inner).exited = true;

        match status {
            Ok(status) => {
                if let Some(err) = process::exit_error(status) {
                    if self.cancel.is_cancelled() {
                        self.shared.record(ShellBatchError::Cancelled, true);
                    } else if !self.interrupted() {
                        self.shared.record(err, true);
                    }
                }
            }
            Err(e) => self.shared.record(ShellBatchError::Io(e), true),
        }

        self.drain(reader, "output reader").await;
        if let Some(writer) = writer {
            self.drain(writer, "input writer").await;
        }
        Ok(())
    }

    fn interrupted(&self) -> bool {
        lock(&self.shared.inner)
            .error
            .as_ref()
            .is_some_and(ShellBatchError::is_interrupted)
    }

    async fn interrupt(
        &self,
        child: &mut Child,
        reason: ShellBatchError,
    ) -> std::io::Result<std::process::ExitStatus> {
        debug!("Session {}: interrupted: {}", self.shared.id, reason);
        self.shared.record(reason, true);
        if let Some(pid) = child.id() {
            if let Err(e) = process::kill_group(pid) {
                warn!("Session {}: failed to kill group {}: {}", self.shared.id, pid, e);
            }
        }
        let _ = child.start_kill();
        child.wait().await
    }

    async fn drain(&self, task: JoinHandle<()>, name: &str) {
        match tokio::time::timeout(DRAIN_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Session {}: {} failed: {}", self.shared.id, name, e),
            Err(_) => debug!(
                "Session {}: {} still busy after shell exit",
                self.shared.id, name
            ),
        }
    }

    /// Pipe the batch to the shell's stdin off the async runtime, then close it.
    fn spawn_writer(&self, mut sink: Box<dyn Write + Send>, batch: Vec<u8>) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);

        tokio::task::spawn_blocking(move || {
            if let Err(e) = write_flush(&mut sink, &batch) {
                shared.record(e, false);
            }
            trace!("Session {}: wrote {} bytes of input", shared.id, batch.len());
        })
    }

    fn spawn_reader(&self, output: PipeReader) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let callback = Arc::clone(&self.output);
        let mut filter = self.trailer.filter();

        tokio::task::spawn_blocking(move || {
            let mut reader = BufReader::new(output);
            let mut buf = Vec::new();
            let mut num = 0usize;

            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => {
                        debug!("Session {}: output EOF", shared.id);
                        break;
                    }
                    Ok(_) => {
                        num += 1;
                        let line = strip_newline(&buf);
                        trace!("Session {}: line {}: {} bytes", shared.id, num, line.len());
                        match filter.feed(line) {
                            LineEvent::Forward => callback(num, line),
                            LineEvent::Suppress => {}
                            LineEvent::WorkDir(dir) => shared.set_work_dir(dir),
                            LineEvent::End => {
                                debug!("Session {}: end sentinel at line {}", shared.id, num);
                                shared.finish();
                                break;
                            }
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        shared.record(ShellBatchError::Read(e), false);
                        break;
                    }
                }
            }
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("command_line", &self.command_line)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line)
    }
}

/// Strip `\n` and a preceding `\r`.
fn strip_newline(buf: &[u8]) -> &[u8] {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    line.strip_suffix(b"\r").unwrap_or(line)
}
