//! Child process plumbing: command construction, user lookup, group kill.

use std::io;
use std::io::PipeReader;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::error::ShellBatchError;
use crate::Result;

/// Numeric identity the shell runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    /// User id.
    pub uid: u32,
    /// Primary group id.
    pub gid: u32,
}

/// How to launch the shell.
#[derive(Debug)]
pub struct LaunchSpec<'a> {
    /// Resolved shell executable.
    pub program: &'a Path,
    /// Flag arguments.
    pub args: &'a [String],
    /// Script file executed instead of reading stdin.
    pub script: Option<&'a Path>,
    /// Identity to assume.
    pub credentials: Option<Credentials>,
    /// Initial working directory.
    pub work_dir: Option<&'a Path>,
}

/// Build the shell command with stdout and stderr merged into one pipe.
///
/// Returns the command and the read end of the combined output. The command
/// holds the write ends; it must be dropped after spawning so that the
/// reader sees EOF once the shell and its descendants are gone.
pub fn build_command(spec: &LaunchSpec<'_>, stdin: Stdio) -> Result<(Command, PipeReader)> {
    let (reader, writer) = io::pipe()?;
    let stderr = writer.try_clone()?;

    let mut cmd = Command::new(spec.program);
    cmd.args(spec.args);
    if let Some(script) = spec.script {
        cmd.arg(script);
    }
    cmd.stdin(stdin)
        .stdout(writer)
        .stderr(stderr)
        .kill_on_drop(true);

    #[cfg(unix)]
    {
        cmd.process_group(0);
        if let Some(creds) = spec.credentials {
            cmd.uid(creds.uid).gid(creds.gid);
        }
    }

    if let Some(dir) = spec.work_dir {
        cmd.current_dir(dir);
    }

    Ok((cmd, reader))
}

/// Render the command line for logs, e.g. `/bin/bash -ex -o pipefail`.
pub fn command_line(spec: &LaunchSpec<'_>) -> String {
    let mut line = spec.program.display().to_string();
    for arg in spec.args {
        line.push(' ');
        line.push_str(arg);
    }
    if let Some(script) = spec.script {
        line.push(' ');
        line.push_str(&script.display().to_string());
    }
    line
}

/// Resolve a user name to its uid and primary gid.
#[cfg(unix)]
pub fn lookup_user(name: &str) -> Result<Credentials> {
    use nix::unistd::User;

    let not_found = || ShellBatchError::UserNotFound(name.to_string());
    if name.is_empty() || name.contains('\0') {
        return Err(not_found());
    }
    let user = User::from_name(name)
        .map_err(|errno| ShellBatchError::Io(errno.into()))?
        .ok_or_else(not_found)?;

    Ok(Credentials {
        uid: user.uid.as_raw(),
        gid: user.gid.as_raw(),
    })
}

/// Resolve a user name to its uid and primary gid.
#[cfg(not(unix))]
pub fn lookup_user(name: &str) -> Result<Credentials> {
    Err(ShellBatchError::UserNotFound(name.to_string()))
}

/// Send SIGKILL to the process group led by `pid`.
///
/// A group that is already gone is not an error.
#[cfg(unix)]
pub fn kill_group(pid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid process id"))?;

    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.into()),
    }
}

/// Process groups are unix-only; the caller falls back to killing the child.
#[cfg(not(unix))]
pub fn kill_group(_pid: u32) -> io::Result<()> {
    Ok(())
}

/// Map an unsuccessful exit status to an error.
pub fn exit_error(status: ExitStatus) -> Option<ShellBatchError> {
    if status.success() {
        return None;
    }
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    Some(ShellBatchError::ExitStatus {
        code: status.code(),
        signal,
    })
}
