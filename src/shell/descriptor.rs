//! Shell variant and invocation arguments.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::options::{SetOptions, Toggle};

/// Supported shell variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShellKind {
    /// GNU Bash, <https://www.gnu.org/software/bash/manual/bash.html>.
    #[default]
    Bash,
    /// POSIX sh, <https://pubs.opengroup.org/onlinepubs/9699919799/utilities/V3_chap02.html>.
    Sh,
}

impl ShellKind {
    /// Executable name of the shell.
    pub fn name(self) -> &'static str {
        match self {
            ShellKind::Bash => "bash",
            ShellKind::Sh => "sh",
        }
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShellKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bash" => Ok(ShellKind::Bash),
            "sh" | "posix" => Ok(ShellKind::Sh),
            other => Err(other.to_string()),
        }
    }
}

/// A shell to launch, with the options to toggle on its command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shell {
    /// Shell variant.
    pub kind: ShellKind,
    /// Options enabled with `-`.
    pub set: SetOptions,
    /// Options disabled with `+`.
    pub unset: SetOptions,
}

impl Shell {
    /// A shell with no options toggled.
    pub fn new(kind: ShellKind) -> Self {
        Self {
            kind,
            set: SetOptions::empty(),
            unset: SetOptions::empty(),
        }
    }

    /// Enable options.
    pub fn with_set(mut self, set: SetOptions) -> Self {
        self.set = set;
        self
    }

    /// Disable options.
    pub fn with_unset(mut self, unset: SetOptions) -> Self {
        self.unset = unset;
        self
    }

    /// Executable name.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Resolve the executable on `PATH`, falling back to the bare name.
    pub fn path(&self) -> PathBuf {
        which::which(self.name()).unwrap_or_else(|_| PathBuf::from(self.name()))
    }

    /// Full argument list: set flags followed by unset flags.
    pub fn args(&self) -> Vec<String> {
        let mut args = self.set.args(Toggle::Set);
        args.extend(self.unset.args(Toggle::Unset));
        args
    }
}

/// Renders as `bash -ex -o pipefail +o emacs`.
impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        for arg in self.args() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shell() {
        let sh = Shell::default();
        assert_eq!(sh.kind, ShellKind::Bash);
        assert!(sh.args().is_empty());
        assert_eq!(sh.to_string(), "bash");
    }

    #[test]
    fn test_full_args() {
        let sh = Shell::new(ShellKind::Bash)
            .with_set(SetOptions::EX_PIPEFAIL)
            .with_unset(SetOptions::EMACS);
        assert_eq!(sh.args(), vec!["-ex", "-o", "pipefail", "+o", "emacs"]);
        assert_eq!(sh.to_string(), "bash -ex -o pipefail +o emacs");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("bash".parse::<ShellKind>(), Ok(ShellKind::Bash));
        assert_eq!("SH".parse::<ShellKind>(), Ok(ShellKind::Sh));
        assert_eq!("posix".parse::<ShellKind>(), Ok(ShellKind::Sh));
        assert!("zsh".parse::<ShellKind>().is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_path_resolves() {
        let path = Shell::new(ShellKind::Sh).path();
        assert!(path.ends_with("sh"));
    }
}
