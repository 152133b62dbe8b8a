//! Fetch tasks: one retrieval operation per metric.
//!
//! Each task turns a backend response into a number or a typed
//! [`FetchError`](crate::error::FetchError), so the poll cycle can treat
//! every task the same way.

mod credential;
mod source;
mod task;

pub use credential::Credential;
pub use source::{HttpMetricSource, MetricSource, parse_metric_value};
pub use task::{FetchTask, FetchTaskSet};

#[cfg(test)]
pub(crate) use task::testing;
