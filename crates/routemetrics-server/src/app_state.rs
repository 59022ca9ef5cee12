//! Shared application state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use routemetrics_core::compose::Metrics;

use crate::config::ServerConfig;
use crate::obs::{ProcessMetrics, StandardHttpMetrics};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServerConfig,
    metrics: Metrics,
    draining: AtomicBool,
}

impl AppState {
    /// Build the metric tree described by `cfg.metrics`.
    pub fn new(cfg: ServerConfig) -> Self {
        let http = Arc::new(StandardHttpMetrics::new(&cfg.metrics.http));
        let mut metrics = Metrics::new().with_http(http.clone(), http.http_metrics());
        if cfg.metrics.process {
            metrics = metrics.with_process(Arc::new(ProcessMetrics::new()));
        }
        tracing::info!(groups = ?metrics.group_names(), "metrics tree ready");

        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                metrics,
                draining: AtomicBool::new(false),
            }),
        }
    }

    pub fn cfg(&self) -> &ServerConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }

    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }
}
