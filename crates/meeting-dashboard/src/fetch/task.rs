//! One fetch task per metric.

use crate::error::{FetchError, FetchErrorKind};
use crate::events::{DashboardEvent, Notification, send_dashboard_event};
use crate::fetch::{Credential, MetricSource, parse_metric_value};
use crate::metrics::MetricKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

/// Retrieves a single metric and reports its own failure.
#[derive(Clone)]
pub struct FetchTask {
    key: MetricKey,
    source: Arc<dyn MetricSource>,
    timeout: Duration,
}

impl FetchTask {
    pub fn new(key: MetricKey, source: Arc<dyn MetricSource>, timeout: Duration) -> Self {
        Self {
            key,
            source,
            timeout,
        }
    }

    pub fn key(&self) -> MetricKey {
        self.key
    }

    /// Fetch and parse the metric.
    ///
    /// Always resolves to a value or a [`FetchError`]. Any failure other than
    /// a missing credential also emits one notification naming the metric;
    /// a missing credential is reported once per cycle by the caller.
    pub async fn fetch(
        &self,
        credential: Option<&Credential>,
        events: &mpsc::Sender<DashboardEvent>,
    ) -> Result<f64, FetchError> {
        let result = match credential {
            Some(credential) => self.fetch_value(credential).await,
            None => Err(FetchError::AuthMissing),
        };

        match &result {
            Ok(value) => debug!("Fetched {}: {}", self.key, value),
            Err(e) => {
                match e.kind() {
                    FetchErrorKind::AuthMissing => {}
                    FetchErrorKind::MalformedResponse => {
                        warn!("Malformed response for {}: {}", self.key, e)
                    }
                    FetchErrorKind::Network | FetchErrorKind::Unauthorized => {
                        warn!("Error fetching {}: {}", self.key, e)
                    }
                }
                if e.kind() != FetchErrorKind::AuthMissing {
                    send_dashboard_event(
                        events,
                        DashboardEvent::Notify(Notification::fetch_failed(self.key)),
                    );
                }
            }
        }

        result
    }

    async fn fetch_value(&self, credential: &Credential) -> Result<f64, FetchError> {
        let body = tokio::time::timeout(self.timeout, self.source.fetch_body(self.key, credential))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;
        parse_metric_value(&body)
    }
}

/// The full set of fetch tasks plus the credential they present.
///
/// The credential is held here rather than looked up by each task, and can be
/// replaced when the operator signs in again.
pub struct FetchTaskSet {
    tasks: Vec<FetchTask>,
    credential: RwLock<Option<Credential>>,
}

impl FetchTaskSet {
    pub fn new(tasks: Vec<FetchTask>, credential: Option<Credential>) -> Self {
        Self {
            tasks,
            credential: RwLock::new(credential),
        }
    }

    /// One task per key, all sharing a source and timeout.
    pub fn for_keys(
        keys: impl IntoIterator<Item = MetricKey>,
        source: Arc<dyn MetricSource>,
        timeout: Duration,
        credential: Option<Credential>,
    ) -> Self {
        let tasks = keys
            .into_iter()
            .map(|key| FetchTask::new(key, source.clone(), timeout))
            .collect();
        Self::new(tasks, credential)
    }

    pub fn tasks(&self) -> &[FetchTask] {
        &self.tasks
    }

    pub fn keys(&self) -> impl Iterator<Item = MetricKey> + '_ {
        self.tasks.iter().map(FetchTask::key)
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }

    pub async fn set_credential(&self, credential: Option<Credential>) {
        *self.credential.write().await = credential;
    }
}
