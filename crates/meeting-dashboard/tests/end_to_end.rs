//! End-to-end poll cycles through the public API.

use async_trait::async_trait;
use meeting_dashboard::{
    Credential, Dashboard, DashboardConfig, DashboardEvent, FetchError, MetricKey, MetricSource,
    NotificationLevel,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Backend stand-in: one canned body or failure per metric.
#[derive(Default)]
struct FakeBackend {
    bodies: Mutex<HashMap<MetricKey, Result<String, FetchError>>>,
}

impl FakeBackend {
    fn set(&self, key: MetricKey, body: &str) {
        self.bodies
            .lock()
            .unwrap()
            .insert(key, Ok(body.to_string()));
    }

    fn fail(&self, key: MetricKey, err: FetchError) {
        self.bodies.lock().unwrap().insert(key, Err(err));
    }
}

#[async_trait]
impl MetricSource for FakeBackend {
    async fn fetch_body(
        &self,
        key: MetricKey,
        credential: &Credential,
    ) -> Result<String, FetchError> {
        assert_eq!(credential.token(), "meeting-token");
        self.bodies
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Network("no route".to_string())))
    }
}

fn mount(backend: Arc<FakeBackend>) -> (Dashboard, mpsc::Receiver<DashboardEvent>) {
    let (tx, rx) = mpsc::channel(256);
    let dashboard = Dashboard::mount(
        &DashboardConfig::default(),
        backend,
        Credential::from_token("meeting-token"),
        tx,
    )
    .unwrap();
    (dashboard, rx)
}

fn drain(rx: &mut mpsc::Receiver<DashboardEvent>) -> Vec<DashboardEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn full_cycle_derives_percentage() {
    let backend = Arc::new(FakeBackend::default());
    backend.set(MetricKey::AttendanceCount, "120");
    backend.set(MetricKey::TotalSubscribedCapital, "1000000");
    backend.set(MetricKey::AttendedSubscribedCapital, "\"250000\"");

    let (dashboard, mut rx) = mount(backend);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let store = dashboard.store();
    assert_eq!(store.get(MetricKey::AttendanceCount).unwrap().current_value, 120.0);
    assert_eq!(
        store.get(MetricKey::TotalSubscribedCapital).unwrap().current_value,
        1_000_000.0
    );
    assert_eq!(store.attendance_percentage().unwrap(), 25.0);
    assert_eq!(
        meeting_dashboard::tui::format_percentage(store.attendance_percentage().unwrap()),
        "25.00%"
    );

    let events = drain(&mut rx);
    let completed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DashboardEvent::CycleCompleted(result) => Some(result),
            _ => None,
        })
        .collect();
    assert_eq!(completed.len(), 1);
    assert!(completed[0].all_succeeded);
    assert!(events.iter().any(|e| matches!(
        e,
        DashboardEvent::Notify(n) if n.title == "Data Updated"
    )));

    dashboard.unmount();
}

#[tokio::test(start_paused = true)]
async fn zero_total_capital_shows_zero_percent() {
    let backend = Arc::new(FakeBackend::default());
    backend.set(MetricKey::AttendanceCount, "0");
    backend.set(MetricKey::TotalSubscribedCapital, "0");
    backend.set(MetricKey::AttendedSubscribedCapital, "0");

    let (dashboard, _rx) = mount(backend);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let pct = dashboard.store().attendance_percentage().unwrap();
    assert_eq!(pct, 0.0);
    assert!(pct.is_finite());
}

#[tokio::test(start_paused = true)]
async fn partial_failure_keeps_stale_value() {
    let backend = Arc::new(FakeBackend::default());
    backend.set(MetricKey::AttendanceCount, "100");
    backend.set(MetricKey::TotalSubscribedCapital, "800000");
    backend.set(MetricKey::AttendedSubscribedCapital, "200000");

    let (dashboard, mut rx) = mount(backend.clone());
    tokio::time::sleep(Duration::from_millis(10)).await;
    drain(&mut rx);

    backend.set(MetricKey::AttendanceCount, "120");
    backend.fail(
        MetricKey::TotalSubscribedCapital,
        FetchError::Network("connection reset".to_string()),
    );
    backend.set(MetricKey::AttendedSubscribedCapital, "250000");

    // Next scheduled cycle
    tokio::time::sleep(Duration::from_secs(45)).await;

    let store = dashboard.store();
    let total = store.get(MetricKey::TotalSubscribedCapital).unwrap();
    assert_eq!(total.current_value, 800_000.0);
    assert_eq!(store.get(MetricKey::AttendanceCount).unwrap().current_value, 120.0);
    let attended = store.get(MetricKey::AttendedSubscribedCapital).unwrap();
    assert_eq!(attended.previous_value, 200_000.0);
    assert_eq!(attended.current_value, 250_000.0);
    assert_eq!(store.attendance_percentage().unwrap(), 31.25);

    let events = drain(&mut rx);
    let failures: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DashboardEvent::Notify(n) if n.level == NotificationLevel::Error => Some(n),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].title, "Data Update Failed");
    assert!(failures[0].description.contains("total subscribed capital"));
    assert!(!events.iter().any(|e| matches!(
        e,
        DashboardEvent::Notify(n) if n.title == "Data Updated"
    )));

    let result = events
        .iter()
        .find_map(|e| match e {
            DashboardEvent::CycleCompleted(result) => Some(result),
            _ => None,
        })
        .unwrap();
    assert!(!result.all_succeeded);
    assert_eq!(result.failed_keys(), vec![MetricKey::TotalSubscribedCapital]);

    dashboard.unmount();
}

#[tokio::test(start_paused = true)]
async fn missing_token_fetches_nothing() {
    let backend = Arc::new(FakeBackend::default());
    let (tx, mut rx) = mpsc::channel(64);
    let dashboard = Dashboard::mount(&DashboardConfig::default(), backend, None, tx).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let events = drain(&mut rx);
    let errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DashboardEvent::Notify(n) => Some(n.title.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec!["Authentication Error"]);
    assert!(
        dashboard
            .store()
            .get(MetricKey::AttendanceCount)
            .unwrap()
            .last_updated_at
            .is_none()
    );
}
