//! Execution tracking
//!
//! Starting and controlling runs goes through an [`ExecutionService`];
//! progress is pulled by polling, one [`PendingFetch`] per tick. Each
//! instance gets an [`ExecutionTracker`] holding its local status and last
//! snapshot, and at most one pending timer in the [`PollScheduler`].

mod fetch;
mod scheduler;
mod service;
mod tracker;
mod types;

#[cfg(test)]
pub(crate) use service::mock;

pub use fetch::{FetchOutcome, PendingFetch};
pub use scheduler::{PollScheduler, TimerAction};
pub use service::ExecutionService;
pub use tracker::ExecutionTracker;
pub use types::{ExecutionSnapshot, RemoteTask, VOLATILE_FIELDS};
