use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(
    command: Commands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match command {
        Commands::Ingest(args) => commands::ingest::handle(&args, ctx, flags).await,
        Commands::Reconstruct(args) => commands::reconstruct::handle(&args, ctx, flags).await,
        Commands::Worker(args) => commands::worker::handle(&args, ctx, flags).await,
        Commands::Sweep(args) => commands::sweep::handle(&args, ctx, flags).await,
        Commands::Project(args) => commands::project::handle(&args, ctx, flags).await,
        Commands::States(args) => commands::states::handle(&args, ctx, flags).await,
        Commands::Projection(args) => commands::projection::handle(&args, ctx, flags).await,
        Commands::Variance(args) => commands::variance::handle(&args, ctx, flags).await,
        Commands::Preview(args) => commands::preview::handle(&args, ctx, flags).await,
        Commands::Tasks(args) => commands::tasks::handle(&args, ctx, flags).await,
        Commands::Alerts(args) => commands::alerts::handle(&args, ctx, flags).await,
        Commands::Compact => commands::compact::handle(ctx, flags).await,
    }
}
