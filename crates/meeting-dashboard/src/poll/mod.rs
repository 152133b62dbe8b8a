//! Poll cycles: concurrent fetches on a fixed cadence.
//!
//! # Cycle
//!
//! ```text
//!   timer tick / refresh now
//!            │
//!            ▼
//!   ┌─────────────────┐   overlap guard: skip if a cycle is still running
//!   │  try_run_cycle  │
//!   └────────┬────────┘
//!            │ join_all (no short-circuit)
//!   ┌────────┼─────────────────┐
//!   ▼        ▼                 ▼
//! countp   sumsub          sumvoting
//!   │        │                 │
//!   └── success: MetricStore::update + MetricUpdated event
//!       failure: snapshot untouched + per-metric notification
//!            │
//!            ▼
//!   PollCycleResult ─► "Data Updated" only if every task succeeded
//! ```

mod aggregator;
mod scheduler;

pub use aggregator::{PollCycleAggregator, PollCycleResult, TaskOutcome};
pub use scheduler::{Job, ScheduleHandle, Scheduler, TokioScheduler};
