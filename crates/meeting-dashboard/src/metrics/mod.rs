//! Metric store and metric types.
//!
//! The store is the only shared mutable state in the dashboard. Poll cycles
//! write into it through [`MetricStore::update`]; the view only reads.

mod store;
mod types;

pub use store::MetricStore;
pub use types::{DisplayMetric, MetricKey, MetricSnapshot, percentage};
