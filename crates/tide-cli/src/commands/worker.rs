use anyhow::Context;
use tokio::sync::watch;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::WorkerArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `tide worker`. Polls until Ctrl-C, or drains once with `--once`.
pub async fn handle(
    args: &WorkerArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let pool = ctx.workers();
    if args.once {
        let report = pool.drain().await.context("worker drain failed")?;
        return output(&report, flags);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
        }
        let _ = shutdown_tx.send(true);
    });

    let result = pool.run(shutdown_rx).await;
    signal.abort();
    result.context("worker pool stopped with an error")
}
