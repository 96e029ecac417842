use crate::cli::GlobalFlags;
use crate::cli::root_commands::AlertsArgs;
use crate::context::AppContext;
use crate::output::output_rows;

/// Handle `tide alerts`.
pub async fn handle(
    args: &AlertsArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let alerts = ctx.engine.store().list_alerts(args.limit).await?;
    output_rows(&alerts, flags)
}
