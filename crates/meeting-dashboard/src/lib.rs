//! Meeting Statistics Dashboard
//!
//! Live attendance and capital figures for a shareholders' meeting console.
//! Three statistics are fetched from the meeting backend on a fixed cadence,
//! a fourth (the share of subscribed capital present) is derived from them,
//! and every change animates on screen from the old value to the new one.
//!
//! - **Metric store**: previous/current snapshot per metric, updated only on
//!   successful fetches
//! - **Fetch tasks**: one authenticated request per metric, failures isolated
//! - **Poll cycles**: all fetches run concurrently; a partial failure leaves the
//!   failed metrics stale and the rest fresh
//! - **Interpolator**: counter animation driven by elapsed time
//! - **Terminal UI**: ratatui view, or a headless logger
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Dashboard                             │
//! │                                                              │
//! │  Scheduler ──tick──► PollCycleAggregator ──► FetchTaskSet    │
//! │                           │        ▲            │            │
//! │                           │        └─ results ──┘            │
//! │                           ▼                     │            │
//! │                      MetricStore          MetricSource       │
//! │                                          (HTTP, Bearer)      │
//! └───────────────────────────┬──────────────────────────────────┘
//!                             │ DashboardEvent (mpsc)
//!                ┌────────────┴────────────┐
//!                ▼                         ▼
//!        tui::App + Interpolator     headless logger
//! ```
//!
//! # Usage
//!
//! ```bash
//! DASHBOARD_TOKEN=... meeting-dashboard --base-url https://console.example/api/
//! meeting-dashboard --variant print --headless
//! ```

pub mod animation;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod fetch;
pub mod headless;
pub mod logging;
pub mod metrics;
pub mod poll;
pub mod tui;

pub use animation::{AnimationState, Interpolator, interpolate};
pub use config::{DashboardConfig, DashboardVariant, EndpointConfig, GaugeScale};
pub use dashboard::{Dashboard, DashboardState};
pub use error::{DashboardError, FetchError, FetchErrorKind, Result};
pub use events::{DashboardEvent, Notification, NotificationLevel, send_dashboard_event};
pub use fetch::{
    Credential, FetchTask, FetchTaskSet, HttpMetricSource, MetricSource, parse_metric_value,
};
pub use metrics::{DisplayMetric, MetricKey, MetricSnapshot, MetricStore, percentage};
pub use poll::{
    PollCycleAggregator, PollCycleResult, ScheduleHandle, Scheduler, TaskOutcome, TokioScheduler,
};
