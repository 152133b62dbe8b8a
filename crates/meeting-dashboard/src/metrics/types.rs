//! Metric identifiers and per-metric snapshot values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A counter fetched from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    /// Number of shareholders present at the meeting
    AttendanceCount,
    /// Total subscribed share capital across all shareholders
    TotalSubscribedCapital,
    /// Subscribed share capital held by present shareholders
    AttendedSubscribedCapital,
}

impl MetricKey {
    /// Every fetched metric, in display order.
    pub const ALL: [MetricKey; 3] = [
        MetricKey::AttendanceCount,
        MetricKey::TotalSubscribedCapital,
        MetricKey::AttendedSubscribedCapital,
    ];

    /// Human-readable name used in logs and notifications.
    pub fn display_name(&self) -> &'static str {
        match self {
            MetricKey::AttendanceCount => "attendance count",
            MetricKey::TotalSubscribedCapital => "total subscribed capital",
            MetricKey::AttendedSubscribedCapital => "attended subscribed capital",
        }
    }

    /// Default endpoint path relative to the API base URL.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            MetricKey::AttendanceCount => "admin/countp",
            MetricKey::TotalSubscribedCapital => "admin/sumsub",
            MetricKey::AttendedSubscribedCapital => "admin/sumvoting",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One of the four numbers shown on the dashboard.
///
/// Three mirror a fetched [`MetricKey`]; the percentage is derived from the
/// two capital metrics whenever either of them changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DisplayMetric {
    Fetched(MetricKey),
    AttendancePercentage,
}

impl DisplayMetric {
    /// Every displayed metric, in display order.
    pub const ALL: [DisplayMetric; 4] = [
        DisplayMetric::Fetched(MetricKey::AttendanceCount),
        DisplayMetric::Fetched(MetricKey::TotalSubscribedCapital),
        DisplayMetric::Fetched(MetricKey::AttendedSubscribedCapital),
        DisplayMetric::AttendancePercentage,
    ];

    /// Card title for this metric.
    pub fn title(&self) -> &'static str {
        match self {
            DisplayMetric::Fetched(MetricKey::AttendanceCount) => "Shareholders Present",
            DisplayMetric::Fetched(MetricKey::TotalSubscribedCapital) => {
                "Total Subscribed Capital"
            }
            DisplayMetric::Fetched(MetricKey::AttendedSubscribedCapital) => {
                "Subscribed Capital Present"
            }
            DisplayMetric::AttendancePercentage => "Subscribed Capital Present (%)",
        }
    }

    /// Whether a change to `key` changes this displayed value.
    pub fn depends_on(&self, key: MetricKey) -> bool {
        match self {
            DisplayMetric::Fetched(own) => *own == key,
            DisplayMetric::AttendancePercentage => matches!(
                key,
                MetricKey::TotalSubscribedCapital | MetricKey::AttendedSubscribedCapital
            ),
        }
    }
}

/// Previous and current value of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Value shown before the most recent successful fetch
    pub previous_value: f64,
    /// Value from the most recent successful fetch
    pub current_value: f64,
    /// When the most recent successful fetch landed (None until the first)
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl Default for MetricSnapshot {
    fn default() -> Self {
        Self {
            previous_value: 0.0,
            current_value: 0.0,
            last_updated_at: None,
        }
    }
}

impl MetricSnapshot {
    /// Shift the current value into `previous_value` and record `value`.
    pub(crate) fn advance(&mut self, value: f64, at: DateTime<Utc>) {
        self.previous_value = self.current_value;
        self.current_value = value;
        self.last_updated_at = Some(at);
    }

    /// Whether the last update actually changed the value.
    pub fn changed(&self) -> bool {
        self.previous_value != self.current_value
    }
}

/// `numerator / denominator * 100`, or 0 when the result would not be finite.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let pct = numerator / denominator * 100.0;
    if pct.is_finite() { pct } else { 0.0 }
}
