//! Repository modules for every persisted Tide record.
//!
//! Each module adds methods to `TideService` via `impl TideService` blocks.

pub mod alert;
pub mod anchor;
pub mod assignment;
pub mod daily_state;
pub mod feed;
pub mod lease;
pub mod plan;
pub mod projection;
pub mod retention;
pub mod task;
