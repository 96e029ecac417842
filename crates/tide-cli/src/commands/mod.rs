pub mod alerts;
pub mod compact;
pub mod dispatch;
pub mod ingest;
pub mod preview;
pub mod project;
pub mod projection;
pub mod reconstruct;
pub mod shared;
pub mod states;
pub mod sweep;
pub mod tasks;
pub mod variance;
pub mod worker;
