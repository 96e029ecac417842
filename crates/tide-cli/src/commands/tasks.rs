use tide_core::enums::TaskStatus;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::TasksArgs;
use crate::commands::shared::parse::parse_enum;
use crate::context::AppContext;
use crate::output::output_rows;

/// Handle `tide tasks`.
pub async fn handle(args: &TasksArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let status = args
        .status
        .as_deref()
        .map(|raw| parse_enum::<TaskStatus>(raw, "status"))
        .transpose()?;
    let tasks = ctx.engine.store().list_tasks(status).await?;
    output_rows(&tasks, flags)
}
