//! What stdout and stderr can show: table colors, a spinner, a width limit.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::OutputFormat;
use crate::output::table::TableOptions;

/// Narrower `COLUMNS` values are ignored.
const MIN_WIDTH: usize = 40;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Terminal {
    pub color: bool,
    pub spinner: bool,
    pub width: Option<usize>,
}

impl Terminal {
    /// Inspect the process streams and environment.
    #[must_use]
    pub fn detect(format: OutputFormat, quiet: bool) -> Self {
        let columns = std::env::var("COLUMNS").ok();
        Self::resolve(
            format,
            quiet,
            std::io::stdout().is_terminal(),
            std::io::stderr().is_terminal(),
            std::env::var_os("NO_COLOR").is_some(),
            columns.as_deref(),
        )
    }

    fn resolve(
        format: OutputFormat,
        quiet: bool,
        stdout_tty: bool,
        stderr_tty: bool,
        no_color: bool,
        columns: Option<&str>,
    ) -> Self {
        Self {
            color: stdout_tty && format == OutputFormat::Table && !quiet && !no_color,
            spinner: stderr_tty && !quiet,
            width: columns
                .and_then(|value| value.parse::<usize>().ok())
                .filter(|width| *width >= MIN_WIDTH),
        }
    }

    #[must_use]
    pub const fn table_options(self) -> TableOptions {
        TableOptions {
            max_width: self.width,
            color: self.color,
        }
    }

    /// A stderr spinner, or a no-op when stderr is not a terminal.
    #[must_use]
    pub fn spinner(self, message: &str) -> Spinner {
        if !self.spinner {
            return Spinner(None);
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Spinner(Some(bar))
    }
}

pub struct Spinner(Option<ProgressBar>);

impl Spinner {
    pub fn succeed(self, message: &str) {
        if let Some(bar) = self.0 {
            bar.finish_with_message(message.to_string());
        }
    }

    pub fn fail(self, message: &str) {
        if let Some(bar) = self.0 {
            bar.abandon_with_message(message.to_string());
        }
    }
}
