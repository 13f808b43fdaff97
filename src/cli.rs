//! Command-line interface for shell-batch.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Shell variant (overrides config file).
    pub shell: Option<String>,
    /// User to run the shell as.
    pub user: Option<String>,
    /// Initial working directory.
    pub work_dir: Option<PathBuf>,
    /// Directory for script files.
    pub storage_dir: Option<PathBuf>,
    /// Keep script files after the run.
    pub keep_script: bool,
    /// Run deadline in seconds.
    pub timeout_secs: Option<u64>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Commands to run, one per line.
    pub commands: Vec<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Args {
    /// Whether the batch is read from stdin (a sole `-` command).
    pub fn reads_stdin(&self) -> bool {
        matches!(self.commands.as_slice(), [only] if only == "-")
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('s') | Long("shell") => {
                result.shell = Some(parser.value()?.parse()?);
            }
            Short('u') | Long("user") => {
                result.user = Some(parser.value()?.parse()?);
            }
            Short('d') | Long("work-dir") => {
                result.work_dir = Some(parser.value()?.parse()?);
            }
            Long("storage-dir") => {
                result.storage_dir = Some(parser.value()?.parse()?);
            }
            Long("keep-script") => {
                result.keep_script = true;
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                result.timeout_secs = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("timeout", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                result.commands.push(os_to_string(val)?);
                for rest in parser.raw_args()? {
                    result.commands.push(os_to_string(rest)?);
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

fn os_to_string(value: OsString) -> Result<String, ArgsError> {
    value
        .into_string()
        .map_err(|v| ArgsError::UnexpectedArgument(v.to_string_lossy().into()))
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-batch {version}
Run a batch of commands in a fresh shell

USAGE:
    shell-batch [OPTIONS] [--] [COMMAND]...

Each COMMAND is one line of the batch. A sole '-' reads the batch from stdin.

OPTIONS:
    -s, --shell <KIND>      Shell to launch: bash or sh [default: bash]
    -u, --user <NAME>       Run the shell as this user
    -d, --work-dir <DIR>    Initial working directory
        --storage-dir <DIR> Write the batch to a script file in DIR
        --keep-script       Keep the script file after the run
    -t, --timeout <SECS>    Kill the shell after SECS seconds
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_BATCH_SHELL       Shell variant (overrides config)
    SHELL_BATCH_USER        User to run as (overrides config)
    SHELL_BATCH_WORK_DIR    Initial working directory (overrides config)
    SHELL_BATCH_STORAGE_DIR Script directory (overrides config)
    SHELL_BATCH_LOG_LEVEL   Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXIT STATUS:
    0 on success, the shell's exit status when it fails, 124 on timeout,
    130 when interrupted, 1 on any other error

EXAMPLES:
    # Run two commands in bash
    shell-batch 'cd /tmp' 'ls -la'

    # Run a script from stdin with POSIX sh and keep a copy
    shell-batch -s sh --storage-dir /var/tmp --keep-script - < build.sh
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-batch {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Argument that is not valid UTF-8.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
