use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

/// Handle `tide compact`.
pub async fn handle(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let retention = &ctx.config.retention;
    let report = ctx
        .engine
        .store()
        .compact(
            ctx.engine.today(),
            retention.daily_state_days,
            retention.projection_days,
        )
        .await
        .context("compaction failed")?;
    tracing::info!(?report, "compaction finished");
    output(&report, flags)
}
