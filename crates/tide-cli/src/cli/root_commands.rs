use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Ingest source events and reference records from a JSON file.
    Ingest(IngestArgs),
    /// Rebuild daily states for one assignment over a date range.
    Reconstruct(ReconstructArgs),
    /// Run recompute workers against the durable queue.
    Worker(WorkerArgs),
    /// Enqueue the nightly catch-up recompute.
    Sweep(SweepArgs),
    /// Project forward from the latest daily state.
    Project(ProjectArgs),
    /// Show reconstructed daily states with staleness.
    States(StatesArgs),
    /// Show the newest saved forward projection.
    Projection(AssignmentArgs),
    /// Planned vs actual for a completed activity.
    Variance(ActivityArgs),
    /// Expected weight and population on an activity's due date.
    Preview(ActivityArgs),
    /// List recompute queue rows.
    Tasks(TasksArgs),
    /// List operational alerts.
    Alerts(AlertsArgs),
    /// Prune rows past their retention window.
    Compact,
}

#[derive(Clone, Debug, Args)]
pub struct IngestArgs {
    /// JSON file: one record, an array of records, or one record per line.
    pub file: PathBuf,
}

#[derive(Clone, Debug, Args)]
pub struct ReconstructArgs {
    #[arg(long)]
    pub assignment: String,
    #[arg(long)]
    pub from: NaiveDate,
    #[arg(long)]
    pub to: NaiveDate,
}

#[derive(Clone, Debug, Args)]
pub struct WorkerArgs {
    /// Drain the queue once and exit instead of polling.
    #[arg(long)]
    pub once: bool,
}

#[derive(Clone, Debug, Args)]
pub struct SweepArgs {
    /// Sweep as of this day (defaults to today).
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// Also drain the queue after enqueueing.
    #[arg(long)]
    pub drain: bool,
}

#[derive(Clone, Debug, Args)]
pub struct ProjectArgs {
    /// Project one assignment; every active assignment when omitted.
    #[arg(long)]
    pub assignment: Option<String>,
    /// Horizon in days (defaults to `projector.horizon_days`).
    #[arg(long)]
    pub horizon: Option<i64>,
}

#[derive(Clone, Debug, Args)]
pub struct StatesArgs {
    #[arg(long)]
    pub assignment: String,
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,
}

#[derive(Clone, Debug, Args)]
pub struct AssignmentArgs {
    #[arg(long)]
    pub assignment: String,
}

#[derive(Clone, Debug, Args)]
pub struct ActivityArgs {
    #[arg(long)]
    pub activity: String,
}

#[derive(Clone, Debug, Args)]
pub struct TasksArgs {
    /// Filter by status: queued, running, done, failed.
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct AlertsArgs {
    #[arg(long, default_value_t = 50)]
    pub limit: u32,
}
