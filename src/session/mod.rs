//! Shell sessions.
//!
//! A [`Session`] launches one shell, feeds it a batch of commands followed
//! by a completion trailer, forwards the shell's output and reports the
//! final working directory.

mod exec;
mod id;
mod options;
mod process;
mod protocol;
mod state;
mod storage;

pub use exec::Session;
pub use id::{CorrelationToken, IdGenerator, SessionId, SharedIdGenerator, UuidGenerator};
pub use options::{stderr_output, OutputFn, ResolvedOptions, SessionDefaults, SessionOptions};
pub use protocol::{LineEvent, LineFilter, ProtocolState, Trailer};
pub use state::SessionState;
pub use storage::{truncate_tail, Storage};
