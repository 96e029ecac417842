use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ReconstructArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `tide reconstruct`. Runs in-process; triggers are evaluated by the worker path only.
pub async fn handle(
    args: &ReconstructArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let report = ctx
        .engine
        .reconstruct(&args.assignment, args.from, args.to)
        .await
        .with_context(|| format!("failed to reconstruct {}", args.assignment))?;
    output(&report, flags)
}
