//! The standard HTTP metric group.

use std::sync::Arc;

use routemetrics_core::compose::MetricGroup;
use routemetrics_core::config::HttpMetricsConfig;
use routemetrics_core::labels::{METHOD, PATH, RESPONSE_CODE, ROUTE};
use routemetrics_core::metrics::{Gauge, Histogram, HttpMetrics};

use super::metrics::{log_scale, GaugeVec, HistogramVec};

const OBSERVED_LABELS: [&str; 4] = [METHOD, RESPONSE_CODE, ROUTE, PATH];
// The in-flight identity never carries a status code.
const IN_FLIGHT_LABELS: [&str; 3] = [METHOD, ROUTE, PATH];

/// Request latency, in-flight count, request and response sizes.
///
/// Disabled instruments are simply not created; their slots in
/// [`StandardHttpMetrics::http_metrics`] stay `None`.
pub struct StandardHttpMetrics {
    total_requests: Option<Arc<HistogramVec>>,
    in_flight_requests: Option<Arc<GaugeVec>>,
    request_sizes: Option<Arc<HistogramVec>>,
    response_sizes: Option<Arc<HistogramVec>>,
}

impl StandardHttpMetrics {
    pub fn new(cfg: &HttpMetricsConfig) -> Self {
        let total_requests = cfg.total_requests.then(|| {
            Arc::new(HistogramVec::new(
                &cfg.total_requests_name(),
                "HTTP request latency in milliseconds.",
                &OBSERVED_LABELS,
                log_scale(cfg.total_requests_range),
            ))
        });
        let in_flight_requests = cfg.in_flight_requests.then(|| {
            Arc::new(GaugeVec::new(
                &cfg.in_flight_requests_name(),
                "HTTP requests currently being processed.",
                &IN_FLIGHT_LABELS,
            ))
        });
        let request_sizes = cfg.request_sizes.then(|| {
            Arc::new(HistogramVec::new(
                &cfg.request_sizes_name(),
                "HTTP request body size in bytes.",
                &OBSERVED_LABELS,
                log_scale(cfg.request_sizes_range),
            ))
        });
        let response_sizes = cfg.response_sizes.then(|| {
            Arc::new(HistogramVec::new(
                &cfg.response_sizes_name(),
                "HTTP response body size in bytes.",
                &OBSERVED_LABELS,
                log_scale(cfg.response_sizes_range),
            ))
        });

        Self {
            total_requests,
            in_flight_requests,
            request_sizes,
            response_sizes,
        }
    }

    /// Instrument slots for the plugin.
    pub fn http_metrics(&self) -> HttpMetrics {
        HttpMetrics {
            total_requests: self
                .total_requests
                .clone()
                .map(|h| h as Arc<dyn Histogram>),
            in_flight_requests: self
                .in_flight_requests
                .clone()
                .map(|g| g as Arc<dyn Gauge>),
            request_sizes: self.request_sizes.clone().map(|h| h as Arc<dyn Histogram>),
            response_sizes: self
                .response_sizes
                .clone()
                .map(|h| h as Arc<dyn Histogram>),
        }
    }

    pub fn total_requests(&self) -> Option<&Arc<HistogramVec>> {
        self.total_requests.as_ref()
    }

    pub fn in_flight_requests(&self) -> Option<&Arc<GaugeVec>> {
        self.in_flight_requests.as_ref()
    }

    pub fn request_sizes(&self) -> Option<&Arc<HistogramVec>> {
        self.request_sizes.as_ref()
    }

    pub fn response_sizes(&self) -> Option<&Arc<HistogramVec>> {
        self.response_sizes.as_ref()
    }
}

impl MetricGroup for StandardHttpMetrics {
    fn render(&self, out: &mut String) {
        if let Some(h) = &self.total_requests {
            h.render(out);
        }
        if let Some(g) = &self.in_flight_requests {
            g.render(out);
        }
        if let Some(h) = &self.request_sizes {
            h.render(out);
        }
        if let Some(h) = &self.response_sizes {
            h.render(out);
        }
    }
}
