use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::prelude::CoreError;

/// Service-level counters, shared by every request handler.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub scans_ingested: usize,
    pub queries: usize,
    pub navigations: usize,
    pub analyses: usize,
    pub markers_created: usize,
    pub markers_deleted: usize,
    pub errors: usize,
    pub store_timeouts: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_ingested(&self) {
        self.update(|m| m.scans_ingested += 1);
    }

    pub fn record_query(&self) {
        self.update(|m| m.queries += 1);
    }

    pub fn record_navigation(&self) {
        self.update(|m| m.navigations += 1);
    }

    pub fn record_analysis(&self) {
        self.update(|m| m.analyses += 1);
    }

    pub fn record_markers_created(&self, count: usize) {
        self.update(|m| m.markers_created += count);
    }

    pub fn record_markers_deleted(&self, count: usize) {
        self.update(|m| m.markers_deleted += count);
    }

    /// Counts a failed request; lock timeouts are tracked separately.
    pub fn record_error(&self, err: &CoreError) {
        let timeout = matches!(err, CoreError::StoreUnavailable(_));
        self.update(|m| {
            m.errors += 1;
            if timeout {
                m.store_timeouts += 1;
            }
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            metrics.clone()
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
