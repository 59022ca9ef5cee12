//! Composition of independent metric groups into one export tree.
//!
//! Each slot is optional; an absent group is skipped by `collect` and
//! `dump` at no cost. Groups never see each other, so HTTP, process and
//! application metrics can be wired together without coupling.

use std::sync::Arc;

use crate::error::{Result, RouteMetricsError};
use crate::metrics::HttpMetrics;

/// A self-contained set of metrics that can refresh and render itself.
pub trait MetricGroup: Send + Sync {
    /// Refresh sampled values before a scrape. Most groups are push-based
    /// and need nothing here.
    fn collect(&self) {}

    /// Append this group's samples in Prometheus text format.
    fn render(&self, out: &mut String);
}

const RESERVED: [&str; 3] = ["http", "process", "custom"];

/// Root of the metrics tree.
#[derive(Clone, Default)]
pub struct Metrics {
    http: Option<Arc<dyn MetricGroup>>,
    http_instruments: HttpMetrics,
    process: Option<Arc<dyn MetricGroup>>,
    custom: Option<Arc<dyn MetricGroup>>,
    extra: Vec<(String, Arc<dyn MetricGroup>)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the HTTP group together with the instruments it exposes to
    /// the plugin.
    pub fn with_http(mut self, group: Arc<dyn MetricGroup>, instruments: HttpMetrics) -> Self {
        self.http = Some(group);
        self.http_instruments = instruments;
        self
    }

    pub fn with_process(mut self, group: Arc<dyn MetricGroup>) -> Self {
        self.process = Some(group);
        self
    }

    pub fn with_custom(mut self, group: Arc<dyn MetricGroup>) -> Self {
        self.custom = Some(group);
        self
    }

    /// Attach an additional named group. Names must be unique.
    pub fn with_group(mut self, name: &str, group: Arc<dyn MetricGroup>) -> Result<Self> {
        if RESERVED.contains(&name) || self.extra.iter().any(|(n, _)| n == name) {
            return Err(RouteMetricsError::InvalidConfig(format!(
                "metric group already defined: {name}"
            )));
        }
        self.extra.push((name.to_string(), group));
        Ok(self)
    }

    /// Instruments for the plugin. Empty (all absent) without an HTTP group.
    pub fn http_metrics(&self) -> HttpMetrics {
        self.http_instruments.clone()
    }

    /// Names of the groups present, in export order.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups().map(|(name, _)| name).collect()
    }

    pub fn collect(&self) {
        for (_, group) in self.groups() {
            group.collect();
        }
    }

    /// Render every present group into one exposition document.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (_, group) in self.groups() {
            group.render(&mut out);
        }
        out
    }

    fn groups(&self) -> impl Iterator<Item = (&str, &Arc<dyn MetricGroup>)> {
        let fixed = [
            ("http", self.http.as_ref()),
            ("process", self.process.as_ref()),
            ("custom", self.custom.as_ref()),
        ];
        fixed
            .into_iter()
            .filter_map(|(name, group)| group.map(|g| (name, g)))
            .chain(self.extra.iter().map(|(name, g)| (name.as_str(), g)))
    }
}
