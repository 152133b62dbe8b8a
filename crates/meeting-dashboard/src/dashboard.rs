//! Mountable dashboard.
//!
//! Mounting wires the store, fetch tasks, and aggregator together and starts
//! polling. The dashboard then runs on its own until it is unmounted or
//! dropped. The store is the source of truth for a view: [`Dashboard::state`]
//! reads it, and the [`DashboardEvent`] channel only signals that something
//! changed or carries a notification.

use crate::config::DashboardConfig;
use crate::error::Result;
use crate::events::DashboardEvent;
use crate::fetch::{Credential, FetchTaskSet, HttpMetricSource, MetricSource};
use crate::metrics::{MetricKey, MetricSnapshot, MetricStore};
use crate::poll::{
    PollCycleAggregator, PollCycleResult, ScheduleHandle, Scheduler, TokioScheduler,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// Everything a view needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub snapshots: BTreeMap<MetricKey, MetricSnapshot>,
    pub refreshing: bool,
    pub last_cycle: Option<PollCycleResult>,
    pub last_full_refresh: Option<DateTime<Utc>>,
}

/// A running dashboard. Dropping it stops the poll timer and discards any
/// response still in flight.
pub struct Dashboard {
    aggregator: Arc<PollCycleAggregator>,
    schedule: ScheduleHandle,
    poll_interval: Duration,
}

impl Dashboard {
    /// Mount against the HTTP backend named in `config`.
    pub fn connect(
        config: &DashboardConfig,
        credential: Option<Credential>,
        events: mpsc::Sender<DashboardEvent>,
    ) -> Result<Self> {
        let source = HttpMetricSource::new(
            &config.base_url,
            config.endpoints.clone(),
            config.request_timeout,
        )?;
        Self::mount(config, Arc::new(source), credential, events)
    }

    /// Mount with an arbitrary metric source on the tokio scheduler.
    pub fn mount(
        config: &DashboardConfig,
        source: Arc<dyn MetricSource>,
        credential: Option<Credential>,
        events: mpsc::Sender<DashboardEvent>,
    ) -> Result<Self> {
        Self::mount_with(config, source, credential, events, &TokioScheduler)
    }

    pub fn mount_with(
        config: &DashboardConfig,
        source: Arc<dyn MetricSource>,
        credential: Option<Credential>,
        events: mpsc::Sender<DashboardEvent>,
        scheduler: &dyn Scheduler,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(MetricStore::with_all_metrics());
        let tasks = Arc::new(FetchTaskSet::for_keys(
            MetricKey::ALL,
            source,
            config.request_timeout,
            credential,
        ));
        let aggregator = Arc::new(PollCycleAggregator::new(
            store,
            tasks,
            events,
            config.skip_overlapping_cycles,
        )?);

        let poll_interval = config.effective_poll_interval();
        let schedule = aggregator.start(scheduler, poll_interval);
        info!(
            "Dashboard mounted ({:?} variant, polling every {:?})",
            config.variant, poll_interval
        );

        Ok(Self {
            aggregator,
            schedule,
            poll_interval,
        })
    }

    pub fn store(&self) -> Arc<MetricStore> {
        Arc::clone(self.aggregator.store())
    }

    /// Current store contents and cycle status.
    pub fn state(&self) -> DashboardState {
        DashboardState {
            snapshots: self.aggregator.store().snapshot_all(),
            refreshing: self.aggregator.is_running(),
            last_cycle: self.aggregator.last_cycle(),
            last_full_refresh: self.aggregator.last_full_refresh(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Start a cycle now, outside the regular cadence.
    ///
    /// Subject to the same overlap guard as timer-driven cycles.
    pub fn refresh_now(&self) {
        info!("Manual refresh requested");
        let aggregator = Arc::clone(&self.aggregator);
        tokio::spawn(async move {
            aggregator.try_run_cycle().await;
        });
    }

    /// Replace the credential presented by every fetch task.
    pub async fn set_credential(&self, credential: Option<Credential>) {
        self.aggregator.tasks().set_credential(credential).await;
    }

    pub fn is_refreshing(&self) -> bool {
        self.aggregator.is_running()
    }

    pub fn is_mounted(&self) -> bool {
        self.schedule.is_active()
    }

    /// Stop polling. In-flight requests are left to finish, but their
    /// results are discarded.
    pub fn unmount(mut self) {
        self.schedule.cancel();
        self.aggregator.close();
        info!("Dashboard unmounted");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.schedule.cancel();
        self.aggregator.close();
    }
}
