//! Headless runner: log dashboard events instead of drawing them.

use crate::dashboard::Dashboard;
use crate::events::{DashboardEvent, NotificationLevel};
use crate::metrics::MetricKey;
use std::future::Future;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Counts kept while running headless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessSummary {
    pub cycles_completed: usize,
    pub cycles_fully_succeeded: usize,
    pub cycles_skipped: usize,
}

/// Log events until Ctrl-C, then unmount.
pub async fn run_headless(
    dashboard: Dashboard,
    events: mpsc::Receiver<DashboardEvent>,
) -> anyhow::Result<HeadlessSummary> {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };
    Ok(run_headless_until(dashboard, events, shutdown).await)
}

/// Log events until `shutdown` resolves or the event channel closes.
pub async fn run_headless_until<F>(
    dashboard: Dashboard,
    mut events: mpsc::Receiver<DashboardEvent>,
    shutdown: F,
) -> HeadlessSummary
where
    F: Future<Output = ()>,
{
    let mut summary = HeadlessSummary::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            event = events.recv() => {
                match event {
                    Some(event) => log_event(&event, &mut summary),
                    None => break,
                }
            }
        }
    }

    dashboard.unmount();
    info!(
        "Headless run finished: {} cycles ({} fully succeeded, {} skipped)",
        summary.cycles_completed, summary.cycles_fully_succeeded, summary.cycles_skipped
    );
    summary
}

fn log_event(event: &DashboardEvent, summary: &mut HeadlessSummary) {
    match event {
        DashboardEvent::CycleStarted => debug!("Poll cycle started"),
        DashboardEvent::CycleSkipped => {
            summary.cycles_skipped += 1;
        }
        DashboardEvent::MetricUpdated { key, snapshot } => {
            info!(
                "{}: {} (was {})",
                key, snapshot.current_value, snapshot.previous_value
            );
        }
        DashboardEvent::CycleCompleted(result) => {
            summary.cycles_completed += 1;
            if result.all_succeeded {
                summary.cycles_fully_succeeded += 1;
            }
            let failed: Vec<MetricKey> = result.failed_keys();
            if !failed.is_empty() {
                warn!(
                    "Poll cycle completed with {} of {} metrics stale: {:?}",
                    failed.len(),
                    result.per_task_outcomes.len(),
                    failed
                );
            }
        }
        DashboardEvent::Notify(notification) => match notification.level {
            NotificationLevel::Info => {
                info!("{}: {}", notification.title, notification.description)
            }
            NotificationLevel::Error => {
                warn!("{}: {}", notification.title, notification.description)
            }
        },
    }
}
