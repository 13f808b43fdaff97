//! Completion protocol.
//!
//! Shells give no structured signal when a batch has finished, so a trailer
//! is appended after the user's commands. It echoes sentinel lines tagged
//! with the session's [`CorrelationToken`]:
//!
//! ```text
//! echo '<token>:start'
//! set +x
//! wait
//! echo "<token>:pwd:$(pwd)"
//! echo '<token>:end'
//! ```
//!
//! `wait` lets backgrounded jobs of the batch finish before the working
//! directory is captured. [`LineFilter`] consumes the shell's output and
//! separates the caller's lines from the sentinels.

use super::id::CorrelationToken;

const START: &str = "start";
const PWD: &str = "pwd:";
const END: &str = "end";

/// The trailer appended after the user's commands.
#[derive(Debug, Clone)]
pub struct Trailer {
    token: CorrelationToken,
}

impl Trailer {
    /// Create a trailer tagged with `token`.
    pub fn new(token: CorrelationToken) -> Self {
        Self { token }
    }

    /// The correlation token.
    pub fn token(&self) -> &CorrelationToken {
        &self.token
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.token, key)
    }

    /// Render the trailer script.
    pub fn script(&self) -> Vec<u8> {
        format!(
            "echo '{start}'\nset +x\nwait\necho \"{pwd}$(pwd)\"\necho '{end}'\n",
            start = self.key(START),
            pwd = self.key(PWD),
            end = self.key(END),
        )
        .into_bytes()
    }

    /// Build a filter that recognises this trailer's sentinels.
    pub fn filter(&self) -> LineFilter {
        LineFilter::new(self.token.clone())
    }
}

/// Where the filter is within the trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolState {
    /// Waiting for the start sentinel; user output is forwarded.
    #[default]
    Armed,
    /// Start sentinel seen; everything is suppressed.
    Hidden,
    /// End sentinel seen; nothing more is consumed.
    Done,
}

/// What to do with one line of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Pass the line to the caller.
    Forward,
    /// Drop the line.
    Suppress,
    /// The trailer reported the final working directory.
    WorkDir(String),
    /// The batch is complete; stop reading.
    End,
}

/// Classifies output lines against the sentinel protocol.
#[derive(Debug, Clone)]
pub struct LineFilter {
    token: CorrelationToken,
    start: Vec<u8>,
    pwd: Vec<u8>,
    end: Vec<u8>,
    state: ProtocolState,
    work_dir_seen: bool,
}

impl LineFilter {
    /// Create a filter for `token`.
    pub fn new(token: CorrelationToken) -> Self {
        let key = |k: &str| format!("{token}:{k}").into_bytes();
        Self {
            start: key(START),
            pwd: key(PWD),
            end: key(END),
            token,
            state: ProtocolState::Armed,
            work_dir_seen: false,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Classify one line (without its trailing newline).
    pub fn feed(&mut self, line: &[u8]) -> LineEvent {
        if self.state == ProtocolState::Done {
            return LineEvent::Suppress;
        }

        if line.starts_with(&self.end) {
            self.state = ProtocolState::Done;
            return LineEvent::End;
        }

        if line.starts_with(&self.start) {
            self.state = ProtocolState::Hidden;
            return LineEvent::Suppress;
        }

        match self.state {
            ProtocolState::Hidden => match line.strip_prefix(self.pwd.as_slice()) {
                Some(dir) if !self.work_dir_seen => {
                    self.work_dir_seen = true;
                    LineEvent::WorkDir(String::from_utf8_lossy(dir).into_owned())
                }
                _ => LineEvent::Suppress,
            },
            // Trace mode echoes the sentinel commands before running them;
            // those lines carry the token but match no sentinel prefix.
            _ if contains(line, self.token.as_bytes()) => LineEvent::Suppress,
            _ => LineEvent::Forward,
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}
