use anyhow::Context;

use crate::cli::root_commands::ProjectArgs;
use crate::cli::{GlobalFlags, OutputFormat};
use crate::context::AppContext;
use crate::output::{output, output_rows};

/// Handle `tide project`.
pub async fn handle(
    args: &ProjectArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    if let Some(assignment_id) = &args.assignment {
        let projection = ctx
            .engine
            .project(assignment_id, args.horizon)
            .await
            .with_context(|| format!("failed to project {assignment_id}"))?;
        return match flags.format {
            OutputFormat::Json => output(&projection, flags),
            OutputFormat::Table | OutputFormat::Raw => {
                output_rows(&projection.series, flags)
            }
        };
    }

    let batch = ctx
        .engine
        .project_all(ctx.engine.today(), args.horizon)
        .await
        .context("projection batch failed")?;
    for failure in &batch.failed {
        tracing::warn!(
            assignment_id = %failure.assignment_id,
            error = %failure.error,
            "projection skipped"
        );
    }
    output(&batch, flags)
}
