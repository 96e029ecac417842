use anyhow::Context;

use crate::cli::root_commands::AssignmentArgs;
use crate::cli::{GlobalFlags, OutputFormat};
use crate::context::AppContext;
use crate::output::{output, output_rows};

/// Handle `tide projection`.
pub async fn handle(
    args: &AssignmentArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let response = ctx
        .engine
        .forward_projection(&args.assignment)
        .await
        .with_context(|| format!("no projection for {}", args.assignment))?;

    match flags.format {
        OutputFormat::Json => output(&response, flags),
        OutputFormat::Table | OutputFormat::Raw => output_rows(&response.series, flags),
    }
}
