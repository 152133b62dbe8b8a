//! Events and user-facing notifications emitted by the dashboard.
//!
//! Poll cycles run in background tasks and report to the view through a
//! bounded channel of [`DashboardEvent`]s. Sending never blocks a cycle.

use crate::metrics::{MetricKey, MetricSnapshot};
use crate::poll::PollCycleResult;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A toast-style message for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    /// Every metric in a cycle refreshed.
    pub fn data_refreshed() -> Self {
        Self {
            level: NotificationLevel::Info,
            title: "Data Updated".to_string(),
            description: "All metrics refreshed successfully".to_string(),
        }
    }

    /// One metric failed to refresh this cycle.
    pub fn fetch_failed(key: MetricKey) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: "Data Update Failed".to_string(),
            description: format!("Could not fetch {}", key.display_name()),
        }
    }

    /// No credential is available, so nothing was fetched.
    pub fn auth_missing() -> Self {
        Self {
            level: NotificationLevel::Error,
            title: "Authentication Error".to_string(),
            description: "No token found. Please log in again.".to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

/// Events sent from poll cycles to whoever renders the dashboard.
#[derive(Debug, Clone)]
pub enum DashboardEvent {
    /// A poll cycle launched its fetch tasks
    CycleStarted,
    /// A timer firing or manual refresh was dropped because a cycle was still running
    CycleSkipped,
    /// A metric received a new value
    MetricUpdated {
        key: MetricKey,
        snapshot: MetricSnapshot,
    },
    /// Every task in a cycle has settled
    CycleCompleted(PollCycleResult),
    /// Show a notification to the operator
    Notify(Notification),
}

/// Send a dashboard event without waiting.
///
/// A full channel drops the event with a warning. A closed channel means the
/// view was torn down while a request was still in flight, which is expected.
pub fn send_dashboard_event(tx: &mpsc::Sender<DashboardEvent>, event: DashboardEvent) {
    if let Err(e) = tx.try_send(event) {
        match e {
            mpsc::error::TrySendError::Full(ev) => {
                warn!("Dashboard event channel full, dropping {}", event_name(&ev));
            }
            mpsc::error::TrySendError::Closed(ev) => {
                debug!(
                    "Dashboard view gone, discarding late {}",
                    event_name(&ev)
                );
            }
        }
    }
}

/// Short name for the event type (for logging).
fn event_name(event: &DashboardEvent) -> &'static str {
    match event {
        DashboardEvent::CycleStarted => "CycleStarted",
        DashboardEvent::CycleSkipped => "CycleSkipped",
        DashboardEvent::MetricUpdated { .. } => "MetricUpdated",
        DashboardEvent::CycleCompleted(_) => "CycleCompleted",
        DashboardEvent::Notify(_) => "Notify",
    }
}
