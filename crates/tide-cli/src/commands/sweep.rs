use anyhow::Context;
use serde::Serialize;
use tide_scheduler::sweep::SweepReport;
use tide_scheduler::worker::DrainReport;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::SweepArgs;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct SweepOutput {
    sweep: SweepReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    drained: Option<DrainReport>,
}

/// Handle `tide sweep`. Meant for a nightly cron; a second instance skips while the lease is held.
pub async fn handle(args: &SweepArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let today = args.date.unwrap_or_else(|| ctx.engine.today());
    let holder = format!("tide-{}", std::process::id());
    let sweep = ctx
        .scheduler
        .sweep(today, &holder)
        .await
        .context("nightly sweep failed")?;

    let drained = if args.drain && sweep.acquired {
        Some(ctx.workers().drain().await.context("drain after sweep failed")?)
    } else {
        None
    };
    output(&SweepOutput { sweep, drained }, flags)
}
