use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

use crate::terminal::Terminal;

/// Top-level CLI parser for the `tide` binary.
#[derive(Debug, Parser)]
#[command(
    name = "tide",
    version,
    about = "Tide - growth state assimilation and forward projection"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, table, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database path (overrides `database.path`)
    #[arg(long, global = true)]
    pub db: Option<String>,
}

impl Cli {
    /// Global flags plus the terminal capabilities they imply.
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
            verbose: self.verbose,
            db: self.db.clone(),
            terminal: Terminal::detect(self.format, self.quiet),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use chrono::NaiveDate;
    use clap::{CommandFactory, Parser};

    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_subcommand() {
        let cli = Cli::try_parse_from(["tide", "--format", "table", "--db", "x.db", "compact"])
            .expect("cli should parse");

        assert_eq!(cli.format, OutputFormat::Table);
        assert_eq!(cli.global_flags().db.as_deref(), Some("x.db"));
        assert!(matches!(cli.command, Commands::Compact));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["tide", "worker", "--once", "--verbose"])
            .expect("cli should parse");

        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Worker(ref args) if args.once));
    }

    #[test]
    fn reconstruct_parses_dates() {
        let cli = Cli::try_parse_from([
            "tide",
            "reconstruct",
            "--assignment",
            "asg-1",
            "--from",
            "2026-03-01",
            "--to",
            "2026-03-31",
        ])
        .expect("cli should parse");

        let Commands::Reconstruct(args) = cli.command else {
            panic!("expected reconstruct");
        };
        assert_eq!(args.from, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(args.to, NaiveDate::from_ymd_opt(2026, 3, 31).unwrap());
    }

    #[test]
    fn reconstruct_rejects_bad_date() {
        let result = Cli::try_parse_from([
            "tide",
            "reconstruct",
            "--assignment",
            "asg-1",
            "--from",
            "03/01/2026",
            "--to",
            "2026-03-31",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn states_window_needs_both_ends() {
        let result =
            Cli::try_parse_from(["tide", "states", "--assignment", "asg-1", "--from", "2026-03-01"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["tide", "states", "--assignment", "asg-1"])
            .expect("window is optional");
        assert!(matches!(cli.command, Commands::States(ref args) if args.from.is_none()));
    }
}
