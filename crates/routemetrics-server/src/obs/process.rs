//! Process-level metrics.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use routemetrics_core::compose::MetricGroup;

/// Start time and uptime of the running process.
pub struct ProcessMetrics {
    started: Instant,
    start_time_seconds: f64,
    // f64 bits of the uptime sampled by the last `collect`.
    uptime_seconds: AtomicU64,
}

impl ProcessMetrics {
    pub fn new() -> Self {
        let start_time_seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            started: Instant::now(),
            start_time_seconds,
            uptime_seconds: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn start_time_seconds(&self) -> f64 {
        self.start_time_seconds
    }

    pub fn uptime_seconds(&self) -> f64 {
        f64::from_bits(self.uptime_seconds.load(Ordering::Relaxed))
    }
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricGroup for ProcessMetrics {
    fn collect(&self) {
        let uptime = self.started.elapsed().as_secs_f64();
        self.uptime_seconds.store(uptime.to_bits(), Ordering::Relaxed);
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP process_start_time_seconds Start time of the process since unix epoch in seconds.");
        let _ = writeln!(out, "# TYPE process_start_time_seconds gauge");
        let _ = writeln!(out, "process_start_time_seconds {}", self.start_time_seconds);

        let _ = writeln!(out, "# HELP process_uptime_seconds Seconds since the process started.");
        let _ = writeln!(out, "# TYPE process_uptime_seconds gauge");
        let _ = writeln!(out, "process_uptime_seconds {}", self.uptime_seconds());
    }
}
