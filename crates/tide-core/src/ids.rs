//! ID prefix constants.
//!
//! IDs are `{prefix}-{8 hex chars}`, generated by the store.

pub const PREFIX_ANCHOR: &str = "anc";
pub const PREFIX_ACTIVITY: &str = "act";
pub const PREFIX_TASK: &str = "rct";
pub const PREFIX_ALERT: &str = "alr";

pub const ALL_PREFIXES: &[&str] = &[PREFIX_ANCHOR, PREFIX_ACTIVITY, PREFIX_TASK, PREFIX_ALERT];
