use anyhow::Context;
use tide_core::window::DateWindow;

use crate::cli::root_commands::StatesArgs;
use crate::cli::{GlobalFlags, OutputFormat};
use crate::context::AppContext;
use crate::output::{output, output_rows};

/// Handle `tide states`. Table and raw print the rows; staleness goes to stderr.
pub async fn handle(
    args: &StatesArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let window = match (args.from, args.to) {
        (Some(from), Some(to)) => Some(DateWindow::new(from, to)?),
        _ => None,
    };
    let response = ctx
        .engine
        .daily_states(&args.assignment, window)
        .await
        .with_context(|| format!("no daily states for {}", args.assignment))?;

    match flags.format {
        OutputFormat::Json => output(&response, flags),
        OutputFormat::Table | OutputFormat::Raw => {
            if response.staleness.stale && !flags.quiet {
                eprintln!(
                    "stale: last computed {} ({} days behind{})",
                    response.staleness.last_computed_day,
                    response.staleness.lag_days,
                    if response.staleness.pending_recompute {
                        ", recompute pending"
                    } else {
                        ""
                    }
                );
            }
            output_rows(&response.states, flags)
        }
    }
}
