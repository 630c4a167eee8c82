//! Task → calendar reconciliation.
//!
//! Tasks are mapped to event payloads by a pure state machine, dispatched in
//! fixed-size windows, and pushed to Calendar through a retrying client. The
//! resulting event id is written back to each task's record.

pub mod dispatch;
pub mod event_mapper;
pub mod retry;
pub mod sync_engine;
pub mod types;

#[cfg(test)]
mod sync_engine_tests;

pub use dispatch::{dispatch, FixedWindow};
pub use event_mapper::{map_task_to_event, plan_task, render_instant};
pub use retry::{retry_with_backoff, Attempt, RetryPolicy};
pub use sync_engine::{Reconciler, RunSummary, TaskOutcome};
pub use types::{
    CalendarEvent, EventPayload, EventTime, InvalidTaskTime, Plan, SkipReason, Task, TaskTime,
};
