//! # shell-batch
//!
//! Run a batch of commands in a fresh bash or POSIX shell and find out when
//! it is really done.
//!
//! A completion trailer is appended after the caller's commands. It waits
//! for background jobs, reports the final working directory and marks the
//! end of the batch with sentinel lines that are never shown to the caller.
//!
//! ## Features
//!
//! - **Pipe or script**: commands go to the shell's stdin, or to a script
//!   file that can be kept for inspection
//! - **Merged output**: stdout and stderr are forwarded line by line
//! - **Cancellation**: deadlines and cancel tokens kill the whole process group
//! - **Layered options**: per-session options over process-wide defaults
//!
//! ## Quick Start
//!
//! ```no_run
//! use shell_batch::{Session, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> shell_batch::Result<()> {
//!     shell_batch::logging::try_init().ok();
//!
//!     let session = Session::create(SessionOptions::new())?;
//!     session.add_command("cd", ["/tmp"])?;
//!     session.run(["ls -la"]).await?;
//!
//!     println!("finished in {:?}", session.last_work_dir());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod shell;

// Re-export commonly used types
pub use error::{Result, ShellBatchError};
pub use session::{
    CorrelationToken, IdGenerator, OutputFn, Session, SessionDefaults, SessionId, SessionOptions,
    SessionState, Storage, UuidGenerator,
};
pub use shell::{SetOptions, Shell, ShellKind, Toggle};
