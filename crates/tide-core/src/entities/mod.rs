//! Entity structs for all Tide domain records.
//!
//! Each entity maps to a table in the libSQL store (see `tide-db` migrations).
//! All structs derive `Serialize`, `Deserialize`, and `JsonSchema` for JSON
//! output and schema validation.

mod anchor;
mod assignment;
mod daily_state;
mod feeds;
mod plan;
mod projection;
mod task;

pub use anchor::{Anchor, NewAnchor};
pub use assignment::Assignment;
pub use daily_state::{DailyState, Provenance};
pub use feeds::{FeedRecord, ProfilePoint, TemperatureReading};
pub use plan::{BaselinePlan, CohortConfig, PlanTemplate, PlannedActivity, TriggerKind, TriggerState};
pub use projection::{ForwardProjection, ProjectionRun};
pub use task::{RecomputeScope, RecomputeTask};
