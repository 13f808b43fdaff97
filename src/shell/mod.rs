//! Shell descriptors.
//!
//! A [`Shell`] names the shell variant to launch and the `set` builtin
//! options to toggle on its command line.
//!
//! # Example
//!
//! ```
//! use shell_batch::shell::{SetOptions, Shell, ShellKind};
//!
//! let sh = Shell::new(ShellKind::Bash).with_set(SetOptions::EX_PIPEFAIL);
//! assert_eq!(sh.args(), vec!["-ex", "-o", "pipefail"]);
//! ```

mod descriptor;
mod options;

pub use descriptor::{Shell, ShellKind};
pub use options::{SetOptions, Toggle};
