//! Dashboard configuration.
//!
//! Loaded from a YAML file (by default `<config dir>/meeting-dashboard/config.yaml`)
//! and then overridden by command-line flags. Durations use humantime syntax,
//! e.g. `poll_interval: 45s` or `animation_duration: 1500ms`.

use crate::error::{DashboardError, Result};
use crate::metrics::MetricKey;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which dashboard layout is running. Each has its own refresh cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DashboardVariant {
    /// Wall display with animated counters
    #[default]
    Primary,
    /// Print-oriented summary; refreshes faster and does not animate
    Print,
}

impl DashboardVariant {
    pub fn default_poll_interval(&self) -> Duration {
        match self {
            DashboardVariant::Primary => Duration::from_secs(45),
            DashboardVariant::Print => Duration::from_secs(15),
        }
    }

    pub fn default_animation_duration(&self) -> Duration {
        match self {
            DashboardVariant::Primary => Duration::from_millis(1500),
            DashboardVariant::Print => Duration::ZERO,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DashboardVariant::Primary => "Shareholder Attendance Dashboard",
            DashboardVariant::Print => "Meeting Statistics",
        }
    }
}

/// Endpoint paths for each metric, relative to `base_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub attendance_count: String,
    pub total_subscribed_capital: String,
    pub attended_subscribed_capital: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            attendance_count: MetricKey::AttendanceCount.default_endpoint().to_string(),
            total_subscribed_capital: MetricKey::TotalSubscribedCapital
                .default_endpoint()
                .to_string(),
            attended_subscribed_capital: MetricKey::AttendedSubscribedCapital
                .default_endpoint()
                .to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn path(&self, key: MetricKey) -> &str {
        match key {
            MetricKey::AttendanceCount => &self.attendance_count,
            MetricKey::TotalSubscribedCapital => &self.total_subscribed_capital,
            MetricKey::AttendedSubscribedCapital => &self.attended_subscribed_capital,
        }
    }
}

/// Full scale of each progress gauge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeScale {
    pub attendance_count: f64,
    pub subscribed_capital: f64,
}

impl Default for GaugeScale {
    fn default() -> Self {
        Self {
            attendance_count: 1_000.0,
            subscribed_capital: 10_000_000.0,
        }
    }
}

/// Configuration for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// API base URL; endpoint paths are appended to it
    pub base_url: String,
    pub endpoints: EndpointConfig,
    pub variant: DashboardVariant,
    /// Time between poll cycles (variant default when absent)
    #[serde(with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
    /// Per-task request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Counter animation length (variant default when absent)
    #[serde(with = "humantime_serde")]
    pub animation_duration: Option<Duration>,
    /// Skip timer firings while the previous cycle is still running
    pub skip_overlapping_cycles: bool,
    /// Frame interval for the terminal view
    #[serde(with = "humantime_serde")]
    pub tick_rate: Duration,
    pub gauge_scale: GaugeScale,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/".to_string(),
            endpoints: EndpointConfig::default(),
            variant: DashboardVariant::default(),
            poll_interval: None,
            request_timeout: Duration::from_secs(10),
            animation_duration: None,
            skip_overlapping_cycles: true,
            tick_rate: Duration::from_millis(50),
            gauge_scale: GaugeScale::default(),
        }
    }
}

impl DashboardConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("meeting-dashboard").join("config.yaml"))
    }

    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| DashboardError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| DashboardError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load from `path`, or defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval
            .unwrap_or_else(|| self.variant.default_poll_interval())
    }

    pub fn effective_animation_duration(&self) -> Duration {
        self.animation_duration
            .unwrap_or_else(|| self.variant.default_animation_duration())
    }

    /// Reject settings the dashboard cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(DashboardError::Config("base_url must not be empty".to_string()));
        }
        if self.effective_poll_interval().is_zero() {
            return Err(DashboardError::Config(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(DashboardError::Config(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.tick_rate.is_zero() {
            return Err(DashboardError::Config(
                "tick_rate must be greater than zero".to_string(),
            ));
        }
        for key in MetricKey::ALL {
            if self.endpoints.path(key).trim().is_empty() {
                return Err(DashboardError::Config(format!(
                    "endpoint for {} must not be empty",
                    key
                )));
            }
        }
        Ok(())
    }
}
