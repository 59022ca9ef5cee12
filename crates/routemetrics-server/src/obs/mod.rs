//! Lightweight in-process metrics.
//!
//! Metrics are stored as atomics behind `DashMap` families and rendered by
//! the `/metrics` handler. The families implement the core `Histogram` and
//! `Gauge` capabilities, so the instrumentation plugin records into them
//! directly.

pub mod http;
pub mod metrics;
pub mod process;

pub use http::StandardHttpMetrics;
pub use metrics::{log_scale, GaugeVec, HistogramSnapshot, HistogramVec};
pub use process::ProcessMetrics;
