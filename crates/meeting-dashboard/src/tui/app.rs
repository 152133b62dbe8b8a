//! TUI application state and event handling.
//!
//! Metric values and refresh status come from the dashboard's store through
//! [`App::sync`]. Events only carry notifications, so a dropped event never
//! leaves the view out of step with the store.

use crate::animation::Interpolator;
use crate::config::{DashboardConfig, DashboardVariant, GaugeScale};
use crate::dashboard::DashboardState;
use crate::events::{DashboardEvent, Notification};
use crate::metrics::{DisplayMetric, MetricKey, MetricSnapshot, percentage};
use crate::poll::PollCycleResult;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// How long a notification stays on screen.
const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// Application running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Application is running normally
    Running,
    /// Application is shutting down
    Quitting,
}

/// Status indicator shown in the header and status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Refreshing,
    Idle,
}

/// Main TUI application state.
#[derive(Debug)]
pub struct App {
    /// Current application state
    pub state: AppState,
    /// Which dashboard layout is running
    pub variant: DashboardVariant,
    /// Time between poll cycles (for display)
    pub poll_interval: Duration,
    /// Full scale of the progress gauges
    pub gauge_scale: GaugeScale,
    /// Snapshots as of the last sync with the store
    pub snapshots: BTreeMap<MetricKey, MetricSnapshot>,
    /// Attendance percentage derived from the synced snapshots
    pub percentage: f64,
    /// On-screen values of all four displays
    pub interpolator: Interpolator<DisplayMetric>,
    /// Whether a poll cycle was running at the last sync
    pub refreshing: bool,
    /// Completion time of the last cycle in which every fetch succeeded
    pub last_refresh: Option<DateTime<Utc>>,
    /// Most recent cycle result
    pub last_cycle: Option<PollCycleResult>,
    /// Notification currently shown, with the time it arrived
    pub notification: Option<(Notification, Instant)>,
}

impl App {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            state: AppState::Running,
            variant: config.variant,
            poll_interval: config.effective_poll_interval(),
            gauge_scale: config.gauge_scale.clone(),
            snapshots: MetricKey::ALL
                .iter()
                .map(|key| (*key, MetricSnapshot::default()))
                .collect(),
            percentage: 0.0,
            interpolator: Interpolator::new(config.effective_animation_duration()),
            refreshing: false,
            last_refresh: None,
            last_cycle: None,
            notification: None,
        }
    }

    /// Bring the view in line with the dashboard.
    ///
    /// Every metric whose snapshot changed since the last sync starts
    /// animating towards its new value.
    pub fn sync(&mut self, state: DashboardState, now: Instant) {
        self.refreshing = state.refreshing;
        self.last_refresh = state.last_full_refresh;
        self.last_cycle = state.last_cycle;

        let mut capital_changed = false;
        for (key, snapshot) in state.snapshots {
            if self.snapshots.get(&key) == Some(&snapshot) {
                continue;
            }
            self.snapshots.insert(key, snapshot);
            self.interpolator.retarget(
                DisplayMetric::Fetched(key),
                snapshot.current_value,
                now,
            );
            capital_changed |= DisplayMetric::AttendancePercentage.depends_on(key);
        }

        if capital_changed {
            self.percentage = percentage(
                self.current(MetricKey::AttendedSubscribedCapital),
                self.current(MetricKey::TotalSubscribedCapital),
            );
            self.interpolator.retarget(
                DisplayMetric::AttendancePercentage,
                self.percentage,
                now,
            );
        }
    }

    /// Apply an event from the poll cycles.
    ///
    /// Only notifications change view state; everything else is picked up by
    /// the next [`App::sync`].
    pub fn apply_event(&mut self, event: DashboardEvent, now: Instant) {
        if let DashboardEvent::Notify(notification) = event {
            self.notification = Some((notification, now));
        }
    }

    fn current(&self, key: MetricKey) -> f64 {
        self.snapshots
            .get(&key)
            .map(|s| s.current_value)
            .unwrap_or(0.0)
    }

    /// Advance animations and expire stale notifications.
    pub fn on_frame(&mut self, now: Instant) {
        self.interpolator.tick(now);
        if let Some((_, shown_at)) = &self.notification {
            if now.saturating_duration_since(*shown_at) >= NOTIFICATION_TTL {
                self.notification = None;
            }
        }
    }

    /// Value to render for a display at `now`.
    pub fn displayed(&self, metric: DisplayMetric, now: Instant) -> f64 {
        self.interpolator.displayed(metric, now)
    }

    /// When the metric behind a display last changed.
    pub fn last_updated(&self, metric: DisplayMetric) -> Option<DateTime<Utc>> {
        match metric {
            DisplayMetric::Fetched(key) => self.snapshots.get(&key).and_then(|s| s.last_updated_at),
            DisplayMetric::AttendancePercentage => [
                MetricKey::TotalSubscribedCapital,
                MetricKey::AttendedSubscribedCapital,
            ]
            .iter()
            .filter_map(|key| self.snapshots.get(key).and_then(|s| s.last_updated_at))
            .max(),
        }
    }

    /// Whether the metric failed in the most recent cycle.
    pub fn is_stale(&self, metric: DisplayMetric) -> bool {
        let Some(cycle) = &self.last_cycle else {
            return false;
        };
        cycle
            .failed_keys()
            .into_iter()
            .any(|key| metric.depends_on(key))
    }

    pub fn status(&self) -> RefreshStatus {
        if self.refreshing {
            RefreshStatus::Refreshing
        } else {
            RefreshStatus::Idle
        }
    }

    /// Drop animation state when the view goes away.
    pub fn teardown(&mut self) {
        self.interpolator.clear();
    }

    pub fn quit(&mut self) {
        self.state = AppState::Quitting;
    }

    pub fn should_quit(&self) -> bool {
        self.state == AppState::Quitting
    }
}

/// Input events from keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Quit,
    Refresh,
    Unknown,
}

impl InputEvent {
    pub fn from_key(key: crossterm::event::KeyCode) -> Self {
        use crossterm::event::KeyCode;

        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') => Self::Quit,
            KeyCode::Char('r') | KeyCode::Char('R') => Self::Refresh,
            KeyCode::Esc => Self::Quit,
            _ => Self::Unknown,
        }
    }
}
