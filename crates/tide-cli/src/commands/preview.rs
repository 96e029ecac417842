use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ActivityArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `tide preview`.
pub async fn handle(
    args: &ActivityArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let response = ctx
        .engine
        .projection_preview(&args.activity)
        .await
        .with_context(|| format!("no preview for activity {}", args.activity))?;
    output(&response, flags)
}
