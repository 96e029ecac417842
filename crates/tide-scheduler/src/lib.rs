//! # tide-scheduler
//!
//! Background side of Tide:
//!
//! - [`bus`]: typed broadcast of domain events
//! - [`scheduler`]: maps domain events to deduplicated recompute tasks
//! - [`worker`]: pool draining the durable queue with bounded retry
//! - [`sweep`]: nightly catch-up, one instance per deployment

pub mod bus;
pub mod error;
pub mod scheduler;
pub mod sweep;
pub mod worker;

pub use bus::EventBus;
pub use error::SchedulerError;
pub use scheduler::RecomputeScheduler;
pub use worker::WorkerPool;
