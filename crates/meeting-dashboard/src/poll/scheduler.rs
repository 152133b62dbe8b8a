//! Periodic job scheduling.
//!
//! The poll cadence goes through the [`Scheduler`] trait so tests can drive it
//! with tokio's paused clock instead of waiting on wall time.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// A job run on every tick. Each invocation produces an independent future.
pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Runs a job periodically until the returned handle is cancelled or dropped.
pub trait Scheduler: Send + Sync {
    /// Run `job` once immediately and then every `period`.
    fn schedule(&self, period: Duration, job: Job) -> ScheduleHandle;
}

/// Cancels a scheduled job when dropped.
///
/// Cancelling stops future ticks only. Runs already in progress finish on
/// their own.
#[derive(Debug)]
pub struct ScheduleHandle {
    abort: Option<AbortHandle>,
}

impl ScheduleHandle {
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort: Some(abort) }
    }

    /// A handle that owns nothing; cancelling it is a no-op.
    pub fn detached() -> Self {
        Self { abort: None }
    }

    pub fn cancel(&mut self) {
        if let Some(abort) = self.abort.take() {
            debug!("Cancelling scheduled job");
            abort.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.abort.as_ref().is_some_and(|a| !a.is_finished())
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Scheduler backed by `tokio::time::interval`.
///
/// Each tick spawns the job as its own task, so a slow run never delays the
/// next tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, period: Duration, job: Job) -> ScheduleHandle {
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tokio::spawn(job());
            }
        });
        ScheduleHandle::new(handle.abort_handle())
    }
}
