//! Single source of truth for metric snapshots.

use crate::error::{DashboardError, Result};
use crate::metrics::types::{MetricKey, MetricSnapshot, percentage};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::trace;

/// Holds the snapshot of every registered metric.
///
/// Each key is updated under its own shard write lock, so a reader never sees
/// `previous_value` and `current_value` from two different updates.
#[derive(Debug, Default)]
pub struct MetricStore {
    snapshots: DashMap<MetricKey, MetricSnapshot>,
}

impl MetricStore {
    /// Create a store with the given keys registered at zero.
    pub fn new(keys: impl IntoIterator<Item = MetricKey>) -> Self {
        let snapshots = DashMap::new();
        for key in keys {
            snapshots.insert(key, MetricSnapshot::default());
        }
        Self { snapshots }
    }

    /// Create a store with every [`MetricKey`] registered.
    pub fn with_all_metrics() -> Self {
        Self::new(MetricKey::ALL)
    }

    pub fn contains(&self, key: MetricKey) -> bool {
        self.snapshots.contains_key(&key)
    }

    pub fn get(&self, key: MetricKey) -> Result<MetricSnapshot> {
        self.snapshots
            .get(&key)
            .map(|entry| *entry)
            .ok_or(DashboardError::UnknownMetric(key))
    }

    /// Record a freshly fetched value, stamped with the current time.
    pub fn update(&self, key: MetricKey, value: f64) -> Result<MetricSnapshot> {
        self.update_at(key, value, Utc::now())
    }

    /// Record a freshly fetched value with an explicit timestamp.
    ///
    /// Returns the snapshot as it stands after the update.
    pub fn update_at(
        &self,
        key: MetricKey,
        value: f64,
        at: DateTime<Utc>,
    ) -> Result<MetricSnapshot> {
        let mut entry = self
            .snapshots
            .get_mut(&key)
            .ok_or(DashboardError::UnknownMetric(key))?;
        entry.advance(value, at);
        trace!(
            "{} updated: {} -> {}",
            key, entry.previous_value, entry.current_value
        );
        Ok(*entry)
    }

    /// Percentage of `percentage_of`'s current value over `over`'s current value.
    ///
    /// Returns 0 when the divisor is 0.
    pub fn derive(&self, percentage_of: MetricKey, over: MetricKey) -> Result<f64> {
        let numerator = self.get(percentage_of)?.current_value;
        let denominator = self.get(over)?.current_value;
        Ok(percentage(numerator, denominator))
    }

    /// Share of subscribed capital held by shareholders in attendance.
    pub fn attendance_percentage(&self) -> Result<f64> {
        self.derive(
            MetricKey::AttendedSubscribedCapital,
            MetricKey::TotalSubscribedCapital,
        )
    }

    /// Copy of every snapshot, ordered by key.
    pub fn snapshot_all(&self) -> BTreeMap<MetricKey, MetricSnapshot> {
        self.snapshots
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}
