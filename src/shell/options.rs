//! Options of the POSIX `set` builtin, rendered as shell invocation flags.
//!
//! Reference: <https://www.gnu.org/software/bash/manual/html_node/The-Set-Builtin.html>

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// A set of `set` builtin options.
    ///
    /// The declaration order is the rendering order: short flags first
    /// (`-abefhkmnptuvxBCEHPT`), then the options that only have a long
    /// `-o name` form.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SetOptions: u32 {
        /// `-a`
        const ALLEXPORT    = 1 << 0;
        /// `-b`
        const NOTIFY       = 1 << 1;
        /// `-e`
        const ERREXIT      = 1 << 2;
        /// `-f`
        const NOGLOB       = 1 << 3;
        /// `-h`
        const HASHALL      = 1 << 4;
        /// `-k`
        const KEYWORD      = 1 << 5;
        /// `-m`
        const MONITOR      = 1 << 6;
        /// `-n`
        const NOEXEC       = 1 << 7;
        /// `-p`
        const PRIVILEGED   = 1 << 8;
        /// `-t`
        const ONECMD       = 1 << 9;
        /// `-u`
        const NOUNSET      = 1 << 10;
        /// `-v`
        const VERBOSE      = 1 << 11;
        /// `-x`
        const XTRACE       = 1 << 12;
        /// `-B`
        const BRACEEXPAND  = 1 << 13;
        /// `-C`
        const NOCLOBBER    = 1 << 14;
        /// `-E`
        const ERRTRACE     = 1 << 15;
        /// `-H`
        const HISTEXPAND   = 1 << 16;
        /// `-P`
        const PHYSICAL     = 1 << 17;
        /// `-T`
        const FUNCTRACE    = 1 << 18;

        /// `-o emacs`
        const EMACS        = 1 << 19;
        /// `-o history`
        const HISTORY      = 1 << 20;
        /// `-o ignoreeof`
        const IGNOREEOF    = 1 << 21;
        /// `-o nolog`
        const NOLOG        = 1 << 22;
        /// `-o pipefail`
        const PIPEFAIL     = 1 << 23;
        /// `-o posix`
        const POSIX        = 1 << 24;
        /// `-o vi`
        const VI           = 1 << 25;

        /// Exit on error, trace commands and fail pipelines: `-ex -o pipefail`.
        const EX_PIPEFAIL = Self::ERREXIT.bits() | Self::XTRACE.bits() | Self::PIPEFAIL.bits();
    }
}

/// Options with a single-letter form, in rendering order.
const SHORT_FLAGS: [(SetOptions, char); 19] = [
    (SetOptions::ALLEXPORT, 'a'),
    (SetOptions::NOTIFY, 'b'),
    (SetOptions::ERREXIT, 'e'),
    (SetOptions::NOGLOB, 'f'),
    (SetOptions::HASHALL, 'h'),
    (SetOptions::KEYWORD, 'k'),
    (SetOptions::MONITOR, 'm'),
    (SetOptions::NOEXEC, 'n'),
    (SetOptions::PRIVILEGED, 'p'),
    (SetOptions::ONECMD, 't'),
    (SetOptions::NOUNSET, 'u'),
    (SetOptions::VERBOSE, 'v'),
    (SetOptions::XTRACE, 'x'),
    (SetOptions::BRACEEXPAND, 'B'),
    (SetOptions::NOCLOBBER, 'C'),
    (SetOptions::ERRTRACE, 'E'),
    (SetOptions::HISTEXPAND, 'H'),
    (SetOptions::PHYSICAL, 'P'),
    (SetOptions::FUNCTRACE, 'T'),
];

/// Options that only exist as `-o name`, in rendering order.
const LONG_FLAGS: [(SetOptions, &str); 7] = [
    (SetOptions::EMACS, "emacs"),
    (SetOptions::HISTORY, "history"),
    (SetOptions::IGNOREEOF, "ignoreeof"),
    (SetOptions::NOLOG, "nolog"),
    (SetOptions::PIPEFAIL, "pipefail"),
    (SetOptions::POSIX, "posix"),
    (SetOptions::VI, "vi"),
];

/// Long names accepted by [`SetOptions::parse_name`] for the short flags.
const SHORT_NAMES: [(SetOptions, &str); 19] = [
    (SetOptions::ALLEXPORT, "allexport"),
    (SetOptions::NOTIFY, "notify"),
    (SetOptions::ERREXIT, "errexit"),
    (SetOptions::NOGLOB, "noglob"),
    (SetOptions::HASHALL, "hashall"),
    (SetOptions::KEYWORD, "keyword"),
    (SetOptions::MONITOR, "monitor"),
    (SetOptions::NOEXEC, "noexec"),
    (SetOptions::PRIVILEGED, "privileged"),
    (SetOptions::ONECMD, "onecmd"),
    (SetOptions::NOUNSET, "nounset"),
    (SetOptions::VERBOSE, "verbose"),
    (SetOptions::XTRACE, "xtrace"),
    (SetOptions::BRACEEXPAND, "braceexpand"),
    (SetOptions::NOCLOBBER, "noclobber"),
    (SetOptions::ERRTRACE, "errtrace"),
    (SetOptions::HISTEXPAND, "histexpand"),
    (SetOptions::PHYSICAL, "physical"),
    (SetOptions::FUNCTRACE, "functrace"),
];

/// Whether options are being turned on (`-`) or off (`+`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// Enable, rendered with `-`.
    Set,
    /// Disable, rendered with `+`.
    Unset,
}

impl Toggle {
    /// The flag prefix for this toggle.
    pub fn symbol(self) -> char {
        match self {
            Toggle::Set => '-',
            Toggle::Unset => '+',
        }
    }
}

impl SetOptions {
    /// Render the options as shell arguments.
    ///
    /// Produces one combined short-flag token (e.g. `-ex`) followed by
    /// `-o name` pairs. An empty set renders to no arguments at all.
    pub fn args(self, toggle: Toggle) -> Vec<String> {
        let symbol = toggle.symbol();
        let mut args = Vec::new();

        let short: String = SHORT_FLAGS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, c)| *c)
            .collect();
        if !short.is_empty() {
            args.push(format!("{symbol}{short}"));
        }

        for (flag, name) in LONG_FLAGS {
            if self.contains(flag) {
                args.push(format!("{symbol}o"));
                args.push(name.to_string());
            }
        }

        args
    }

    /// Render as a space separated `set` string.
    pub fn render(self, toggle: Toggle) -> String {
        self.args(toggle).join(" ")
    }

    /// Look up a single option by its long name (`"errexit"`, `"pipefail"`)
    /// or its short letter (`"e"`).
    pub fn parse_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("ex_pipefail") {
            return Some(Self::EX_PIPEFAIL);
        }
        if let Some((flag, _)) = LONG_FLAGS.iter().find(|(_, n)| *n == name) {
            return Some(*flag);
        }
        if let Some((flag, _)) = SHORT_NAMES.iter().find(|(_, n)| *n == name) {
            return Some(*flag);
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => SHORT_FLAGS
                .iter()
                .find(|(_, letter)| *letter == c)
                .map(|(flag, _)| *flag),
            _ => None,
        }
    }

    /// Build a set from a list of names; returns the first unknown name as
    /// the error.
    pub fn from_names<I, S>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Self::empty(), |acc, name| {
            let name = name.as_ref();
            Self::parse_name(name)
                .map(|flag| acc | flag)
                .ok_or_else(|| name.to_string())
        })
    }
}

impl fmt::Display for SetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Toggle::Set))
    }
}
