use clap::ValueEnum;

use crate::terminal::Terminal;

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty JSON document
    Json,
    /// Aligned columns
    Table,
    /// Compact JSON, one line per row for lists
    Raw,
}

/// Settings every handler sees, resolved once from the command line.
#[derive(Clone, Debug)]
pub struct GlobalFlags {
    pub format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    /// Store path overriding `database.path`.
    pub db: Option<String>,
    pub terminal: Terminal,
}

impl GlobalFlags {
    /// Fallback tracing filter when `TIDE_LOG` is unset.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, true) => "debug",
            (false, false) => "warn",
        }
    }
}
