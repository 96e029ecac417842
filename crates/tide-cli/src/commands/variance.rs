use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ActivityArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `tide variance`.
pub async fn handle(
    args: &ActivityArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let response = ctx
        .engine
        .variance(&args.activity)
        .await
        .with_context(|| format!("no variance for activity {}", args.activity))?;
    output(&response, flags)
}
