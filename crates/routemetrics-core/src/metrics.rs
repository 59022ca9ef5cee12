//! Registry capabilities consumed by the instrumentation.
//!
//! The registry itself (bucket math, label encoding, exposition) lives
//! elsewhere; the plugin only sees these traits. Every call is fallible so
//! a misconfigured metric surfaces as a `RouteMetricsError` the caller can
//! discard instead of a panic on the request path.

use std::sync::Arc;

use crate::error::Result;

/// Borrowed label set: `(name, value)` pairs.
pub type Labels<'a> = [(&'a str, &'a str)];

/// Histogram capability. Must tolerate concurrent callers.
pub trait Histogram: Send + Sync {
    fn observe(&self, value: f64, labels: &Labels<'_>) -> Result<()>;
}

/// Gauge capability. Net value must reflect all concurrent callers.
pub trait Gauge: Send + Sync {
    fn increment(&self, labels: &Labels<'_>) -> Result<()>;
    fn decrement(&self, labels: &Labels<'_>) -> Result<()>;
}

/// The four standard HTTP instruments. Each slot is optional; an absent
/// slot means "do not record", never an error.
#[derive(Clone, Default)]
pub struct HttpMetrics {
    pub total_requests: Option<Arc<dyn Histogram>>,
    pub in_flight_requests: Option<Arc<dyn Gauge>>,
    pub request_sizes: Option<Arc<dyn Histogram>>,
    pub response_sizes: Option<Arc<dyn Histogram>>,
}

impl HttpMetrics {
    /// True when no instrument is present (installing the plugin is a no-op).
    pub fn is_empty(&self) -> bool {
        self.total_requests.is_none()
            && self.in_flight_requests.is_none()
            && self.request_sizes.is_none()
            && self.response_sizes.is_none()
    }
}
