//! Poll cycle orchestration.

use crate::error::{DashboardError, FetchErrorKind, Result};
use crate::events::{DashboardEvent, Notification, send_dashboard_event};
use crate::fetch::FetchTaskSet;
use crate::metrics::{MetricKey, MetricStore};
use crate::poll::{ScheduleHandle, Scheduler};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How one fetch task settled within a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskOutcome {
    /// Fetched and committed to the store
    Success(f64),
    /// Fetch failed; the snapshot was left untouched
    Failure(FetchErrorKind),
    /// Fetched, but the store has no slot for this metric
    StoreRejected,
    /// Fetched after the aggregator was closed; not committed
    Discarded,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }
}

/// Outcome of a complete poll cycle. Only built once every task has settled.
#[derive(Debug, Clone, PartialEq)]
pub struct PollCycleResult {
    pub per_task_outcomes: BTreeMap<MetricKey, TaskOutcome>,
    pub all_succeeded: bool,
    pub completed_at: DateTime<Utc>,
}

impl PollCycleResult {
    pub fn new(
        per_task_outcomes: BTreeMap<MetricKey, TaskOutcome>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let all_succeeded = per_task_outcomes.values().all(TaskOutcome::is_success);
        Self {
            per_task_outcomes,
            all_succeeded,
            completed_at,
        }
    }

    pub fn failed_keys(&self) -> Vec<MetricKey> {
        self.per_task_outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn succeeded_count(&self) -> usize {
        self.per_task_outcomes
            .values()
            .filter(|outcome| outcome.is_success())
            .count()
    }
}

/// Runs every fetch task concurrently, commits successes, and reports the cycle.
pub struct PollCycleAggregator {
    store: Arc<MetricStore>,
    tasks: Arc<FetchTaskSet>,
    events: mpsc::Sender<DashboardEvent>,
    skip_overlapping: bool,
    in_flight: AtomicUsize,
    closed: AtomicBool,
    last_cycle: Mutex<Option<PollCycleResult>>,
    last_full_refresh: Mutex<Option<DateTime<Utc>>>,
}

/// Decrements the in-flight counter when a cycle ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PollCycleAggregator {
    /// Create an aggregator.
    ///
    /// Fails with [`DashboardError::UnknownMetric`] if any task targets a
    /// metric the store does not hold.
    pub fn new(
        store: Arc<MetricStore>,
        tasks: Arc<FetchTaskSet>,
        events: mpsc::Sender<DashboardEvent>,
        skip_overlapping: bool,
    ) -> Result<Self> {
        if let Some(key) = tasks.keys().find(|key| !store.contains(*key)) {
            return Err(DashboardError::UnknownMetric(key));
        }

        Ok(Self {
            store,
            tasks,
            events,
            skip_overlapping,
            in_flight: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            last_cycle: Mutex::new(None),
            last_full_refresh: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    pub fn tasks(&self) -> &Arc<FetchTaskSet> {
        &self.tasks
    }

    /// Stop committing results. Fetches still in flight finish, but their
    /// values never reach the store.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Poll cycle aggregator closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Result of the most recently completed cycle.
    pub fn last_cycle(&self) -> Option<PollCycleResult> {
        lock(&self.last_cycle).clone()
    }

    /// Completion time of the last cycle in which every fetch succeeded.
    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_full_refresh)
    }

    /// Whether at least one cycle is still waiting on its tasks.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Run a cycle unless the overlap guard says one is already running.
    ///
    /// Returns `None` when the cycle was skipped.
    pub async fn try_run_cycle(&self) -> Option<PollCycleResult> {
        let _guard = if self.skip_overlapping {
            if self
                .in_flight
                .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                debug!("Previous poll cycle still running, skipping");
                send_dashboard_event(&self.events, DashboardEvent::CycleSkipped);
                return None;
            }
            InFlightGuard(&self.in_flight)
        } else {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            InFlightGuard(&self.in_flight)
        };

        Some(self.run_cycle().await)
    }

    /// Run one full poll cycle.
    ///
    /// Every task is launched at once and every task is awaited, whether or
    /// not others have failed. Each success is committed to the store as soon
    /// as its own task finishes.
    pub async fn run_cycle(&self) -> PollCycleResult {
        send_dashboard_event(&self.events, DashboardEvent::CycleStarted);

        let Some(credential) = self.tasks.credential().await else {
            warn!("No authentication token found, skipping fetch");
            send_dashboard_event(
                &self.events,
                DashboardEvent::Notify(Notification::auth_missing()),
            );
            let outcomes = self
                .tasks
                .keys()
                .map(|key| (key, TaskOutcome::Failure(FetchErrorKind::AuthMissing)))
                .collect();
            return self.finish(PollCycleResult::new(outcomes, Utc::now()));
        };

        info!("Starting poll cycle ({} tasks)", self.tasks.tasks().len());

        let fetches = self.tasks.tasks().iter().map(|task| {
            let credential = &credential;
            async move {
                let key = task.key();
                let outcome = match task.fetch(Some(credential), &self.events).await {
                    Ok(value) => self.commit(key, value),
                    Err(e) => TaskOutcome::Failure(e.kind()),
                };
                (key, outcome)
            }
        });

        let outcomes: BTreeMap<_, _> = join_all(fetches).await.into_iter().collect();
        let result = PollCycleResult::new(outcomes, Utc::now());

        if self.is_closed() {
            debug!("Poll cycle finished after close, results discarded");
        } else if result.all_succeeded {
            info!("All metrics fetched successfully");
            send_dashboard_event(
                &self.events,
                DashboardEvent::Notify(Notification::data_refreshed()),
            );
        } else {
            warn!(
                "Poll cycle finished with {} of {} fetches failed: {:?}",
                result.per_task_outcomes.len() - result.succeeded_count(),
                result.per_task_outcomes.len(),
                result.failed_keys()
            );
        }

        self.finish(result)
    }

    fn commit(&self, key: MetricKey, value: f64) -> TaskOutcome {
        if self.is_closed() {
            debug!("Discarding late value for {} after close", key);
            return TaskOutcome::Discarded;
        }
        match self.store.update(key, value) {
            Ok(snapshot) => {
                send_dashboard_event(
                    &self.events,
                    DashboardEvent::MetricUpdated { key, snapshot },
                );
                TaskOutcome::Success(value)
            }
            Err(e) => {
                error!("Store rejected fetched value for {}: {}", key, e);
                TaskOutcome::StoreRejected
            }
        }
    }

    fn finish(&self, result: PollCycleResult) -> PollCycleResult {
        debug!("Poll cycle completed at {}", result.completed_at);
        if self.is_closed() {
            return result;
        }
        if result.all_succeeded {
            *lock(&self.last_full_refresh) = Some(result.completed_at);
        }
        *lock(&self.last_cycle) = Some(result.clone());
        send_dashboard_event(&self.events, DashboardEvent::CycleCompleted(result.clone()));
        result
    }

    /// Start polling: one cycle now, then one every `period`.
    pub fn start(
        self: &Arc<Self>,
        scheduler: &dyn Scheduler,
        period: Duration,
    ) -> ScheduleHandle {
        info!("Polling every {:?}", period);
        let aggregator = Arc::clone(self);
        scheduler.schedule(
            period,
            Arc::new(move || {
                let aggregator = aggregator.clone();
                async move {
                    aggregator.try_run_cycle().await;
                }
                .boxed()
            }),
        )
    }
}

/// Lock ignoring poison; the guarded values are plain data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::testing::ScriptedSource;
    use crate::fetch::{Credential, MetricSource};
    use crate::metrics::MetricSnapshot;
    use crate::poll::TokioScheduler;

    struct Harness {
        source: Arc<ScriptedSource>,
        aggregator: Arc<PollCycleAggregator>,
        rx: mpsc::Receiver<DashboardEvent>,
    }

    impl Harness {
        fn new(skip_overlapping: bool) -> Self {
            Self::with_credential(skip_overlapping, Credential::from_token("token"))
        }

        fn with_credential(skip_overlapping: bool, credential: Option<Credential>) -> Self {
            let source = Arc::new(ScriptedSource::new());
            let dyn_source: Arc<dyn MetricSource> = source.clone();
            let tasks = Arc::new(FetchTaskSet::for_keys(
                MetricKey::ALL,
                dyn_source,
                Duration::from_secs(10),
                credential,
            ));
            let store = Arc::new(MetricStore::with_all_metrics());
            let (tx, rx) = mpsc::channel(256);
            let aggregator =
                Arc::new(PollCycleAggregator::new(store, tasks, tx, skip_overlapping).unwrap());
            Self {
                source,
                aggregator,
                rx,
            }
        }

        fn store(&self) -> &MetricStore {
            self.aggregator.store()
        }

        fn drain(&mut self) -> Vec<DashboardEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.rx.try_recv() {
                out.push(event);
            }
            out
        }

        fn notifications(&mut self) -> Vec<Notification> {
            self.drain()
                .into_iter()
                .filter_map(|e| match e {
                    DashboardEvent::Notify(n) => Some(n),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_unknown_metric_rejected_at_construction() {
        let source: Arc<dyn MetricSource> = Arc::new(ScriptedSource::new());
        let tasks = Arc::new(FetchTaskSet::for_keys(
            MetricKey::ALL,
            source,
            Duration::from_secs(1),
            None,
        ));
        let store = Arc::new(MetricStore::new([MetricKey::AttendanceCount]));
        let (tx, _rx) = mpsc::channel(1);

        let result = PollCycleAggregator::new(store, tasks, tx, true);
        assert!(matches!(
            result,
            Err(DashboardError::UnknownMetric(MetricKey::TotalSubscribedCapital))
        ));
    }

    #[tokio::test]
    async fn test_all_outcome_combinations() {
        for mask in 0u8..8 {
            let mut h = Harness::new(true);
            for (i, key) in MetricKey::ALL.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    h.source.respond(*key, 100.0 + i as f64);
                } else {
                    h.source.fail(*key, FetchError::Network("down".to_string()));
                }
            }

            let result = h.aggregator.run_cycle().await;
            assert_eq!(result.all_succeeded, mask == 0b111, "mask {mask:03b}");
            assert_eq!(result.per_task_outcomes.len(), 3);

            let mut failures = 0;
            for (i, key) in MetricKey::ALL.iter().enumerate() {
                let snapshot = h.store().get(*key).unwrap();
                if mask & (1 << i) != 0 {
                    assert_eq!(
                        result.per_task_outcomes[key],
                        TaskOutcome::Success(100.0 + i as f64)
                    );
                    assert_eq!(snapshot.current_value, 100.0 + i as f64);
                } else {
                    failures += 1;
                    assert_eq!(
                        result.per_task_outcomes[key],
                        TaskOutcome::Failure(FetchErrorKind::Network)
                    );
                    assert_eq!(snapshot, MetricSnapshot::default());
                }
            }

            let notes = h.notifications();
            let refreshed = notes
                .iter()
                .filter(|n| **n == Notification::data_refreshed())
                .count();
            let failed = notes.iter().filter(|n| n.is_error()).count();
            assert_eq!(failed, failures, "mask {mask:03b}");
            assert_eq!(refreshed, usize::from(mask == 0b111), "mask {mask:03b}");
        }
    }

    #[tokio::test]
    async fn test_failed_task_never_mutates_snapshot() {
        let mut h = Harness::new(true);
        let key = MetricKey::TotalSubscribedCapital;

        h.source.respond(key, 500.0);
        h.aggregator.run_cycle().await;
        let before = h.store().get(key).unwrap();

        for err in [
            FetchError::Network("reset".to_string()),
            FetchError::Unauthorized(401),
            FetchError::MalformedResponse("<html>".to_string()),
        ] {
            h.source.fail(key, err);
            h.aggregator.run_cycle().await;
            assert_eq!(h.store().get(key).unwrap(), before);
        }

        h.source.respond(key, 700.0);
        h.aggregator.run_cycle().await;
        let after = h.store().get(key).unwrap();
        assert_eq!(after.previous_value, 500.0);
        assert_eq!(after.current_value, 700.0);
        h.drain();
    }

    #[tokio::test]
    async fn test_missing_credential_single_notification() {
        let mut h = Harness::with_credential(true, None);
        for key in MetricKey::ALL {
            h.source.respond(key, 1.0);
        }

        let result = h.aggregator.run_cycle().await;
        assert!(!result.all_succeeded);
        assert!(
            result
                .per_task_outcomes
                .values()
                .all(|o| *o == TaskOutcome::Failure(FetchErrorKind::AuthMissing))
        );
        assert_eq!(h.source.call_count(), 0);
        assert_eq!(h.notifications(), vec![Notification::auth_missing()]);
        for key in MetricKey::ALL {
            assert_eq!(h.store().get(key).unwrap(), MetricSnapshot::default());
        }

        h.aggregator
            .tasks()
            .set_credential(Credential::from_token("fresh"))
            .await;
        let result = h.aggregator.run_cycle().await;
        assert!(result.all_succeeded);
        assert_eq!(h.source.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_run_concurrently() {
        let h = Harness::new(true);
        for key in MetricKey::ALL {
            h.source.respond(key, 1.0);
            h.source.delay(key, Duration::from_secs(2));
        }

        let started = tokio::time::Instant::now();
        let result = h.aggregator.run_cycle().await;
        assert!(result.all_succeeded);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3), "tasks ran sequentially: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_short_circuit_on_first_failure() {
        let h = Harness::new(true);
        h.source
            .fail(MetricKey::AttendanceCount, FetchError::Network("refused".to_string()));
        h.source.respond(MetricKey::TotalSubscribedCapital, 1_000.0);
        h.source.delay(MetricKey::TotalSubscribedCapital, Duration::from_secs(3));
        h.source.respond(MetricKey::AttendedSubscribedCapital, 400.0);
        h.source
            .delay(MetricKey::AttendedSubscribedCapital, Duration::from_secs(5));

        let result = h.aggregator.run_cycle().await;
        assert!(!result.all_succeeded);
        assert_eq!(result.failed_keys(), vec![MetricKey::AttendanceCount]);
        assert_eq!(h.store().attendance_percentage().unwrap(), 40.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlap_guard_skips_second_cycle() {
        let mut h = Harness::new(true);
        for key in MetricKey::ALL {
            h.source.respond(key, 1.0);
            h.source.delay(key, Duration::from_secs(100));
        }

        let aggregator = h.aggregator.clone();
        let first = tokio::spawn(async move { aggregator.try_run_cycle().await });
        while !h.aggregator.is_running() {
            tokio::task::yield_now().await;
        }

        assert!(h.aggregator.try_run_cycle().await.is_none());
        assert!(first.await.unwrap().is_some());
        assert!(!h.aggregator.is_running());
        assert_eq!(h.source.call_count(), 3);
        assert!(
            h.drain()
                .iter()
                .any(|e| matches!(e, DashboardEvent::CycleSkipped))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlap_allowed_without_guard() {
        let h = Harness::new(false);
        for key in MetricKey::ALL {
            h.source.respond(key, 1.0);
            h.source.delay(key, Duration::from_secs(100));
        }

        let aggregator = h.aggregator.clone();
        let first = tokio::spawn(async move { aggregator.try_run_cycle().await });
        while !h.aggregator.is_running() {
            tokio::task::yield_now().await;
        }

        assert!(h.aggregator.try_run_cycle().await.is_some());
        assert!(first.await.unwrap().is_some());
        assert_eq!(h.source.call_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_polling_cadence() {
        let h = Harness::new(true);
        for key in MetricKey::ALL {
            h.source.respond(key, 1.0);
        }

        let mut handle = h.aggregator.start(&TokioScheduler, Duration::from_secs(45));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.source.call_count(), 3);

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(h.source.call_count(), 6);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(h.source.call_count(), 6);
    }

    #[tokio::test]
    async fn test_cycle_events_order() {
        let mut h = Harness::new(true);
        for key in MetricKey::ALL {
            h.source.respond(key, 2.0);
        }
        h.aggregator.run_cycle().await;

        let events = h.drain();
        assert!(matches!(events.first(), Some(DashboardEvent::CycleStarted)));
        assert!(matches!(
            events.last(),
            Some(DashboardEvent::CycleCompleted(r)) if r.all_succeeded
        ));
        let updates = events
            .iter()
            .filter(|e| matches!(e, DashboardEvent::MetricUpdated { .. }))
            .count();
        assert_eq!(updates, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_discards_in_flight_results() {
        let mut h = Harness::new(true);
        for key in MetricKey::ALL {
            h.source.respond(key, 9.0);
            h.source.delay(key, Duration::from_secs(5));
        }

        let aggregator = h.aggregator.clone();
        let cycle = tokio::spawn(async move { aggregator.run_cycle().await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        h.aggregator.close();

        let result = cycle.await.unwrap();
        assert!(!result.all_succeeded);
        assert!(
            result
                .per_task_outcomes
                .values()
                .all(|o| *o == TaskOutcome::Discarded)
        );
        for key in MetricKey::ALL {
            assert_eq!(h.store().get(key).unwrap(), MetricSnapshot::default());
        }
        assert!(h.aggregator.last_cycle().is_none());

        let events = h.drain();
        assert!(!events.iter().any(|e| matches!(
            e,
            DashboardEvent::MetricUpdated { .. } | DashboardEvent::CycleCompleted(_)
        )));
    }

    #[tokio::test]
    async fn test_last_cycle_and_full_refresh_tracked() {
        let h = Harness::new(true);
        assert!(h.aggregator.last_cycle().is_none());
        assert!(h.aggregator.last_full_refresh().is_none());

        for key in MetricKey::ALL {
            h.source.respond(key, 1.0);
        }
        let full = h.aggregator.run_cycle().await;
        assert_eq!(h.aggregator.last_full_refresh(), Some(full.completed_at));

        h.source
            .fail(MetricKey::AttendanceCount, FetchError::Network("down".to_string()));
        let partial = h.aggregator.run_cycle().await;
        assert_eq!(h.aggregator.last_cycle(), Some(partial));
        assert_eq!(h.aggregator.last_full_refresh(), Some(full.completed_at));
    }
}
