//! In-process metrics registry.
//!
//! Gauge and histogram families with dynamic labels backed by `DashMap`.
//! Each family declares its label names up front; an observation carrying
//! an undeclared label is rejected with `LabelMismatch` instead of silently
//! creating a new series. Labels are flattened into sorted key vectors to
//! keep deterministic ordering in the rendered output.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use routemetrics_core::config::BucketRange;
use routemetrics_core::error::{Result, RouteMetricsError};
use routemetrics_core::metrics::{Gauge, Histogram, Labels};

type LabelKey = Vec<(String, String)>;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn render_labels(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    if !help.is_empty() {
        let _ = writeln!(out, "# HELP {} {}", name, help);
    }
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

/// Name, help text and allowed label names of one metric family.
#[derive(Debug, Clone)]
struct Descriptor {
    name: String,
    help: String,
    label_names: Vec<String>,
}

impl Descriptor {
    fn new(name: &str, help: &str, label_names: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            label_names: label_names.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn key(&self, labels: &Labels<'_>) -> Result<LabelKey> {
        if let Some((bad, _)) = labels
            .iter()
            .find(|(k, _)| !self.label_names.iter().any(|n| n == k))
        {
            tracing::trace!(metric = %self.name, label = %bad, "undeclared label");
            return Err(RouteMetricsError::LabelMismatch {
                metric: self.name.clone(),
                expected: self.label_names.clone(),
                got: labels.iter().map(|(k, _)| k.to_string()).collect(),
            });
        }
        let mut key: LabelKey = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        key.sort();
        Ok(key)
    }
}

pub struct GaugeVec {
    desc: Descriptor,
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Self {
        Self {
            desc: Descriptor::new(name, help, label_names),
            map: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    /// Add an arbitrary signed delta.
    pub fn add(&self, labels: &Labels<'_>, v: i64) -> Result<()> {
        let key = self.desc.key(labels)?;
        let gauge = self.map.entry(key).or_insert_with(|| AtomicI64::new(0));
        gauge.fetch_add(v, Ordering::Relaxed);
        Ok(())
    }

    /// Current value of one series, if it was ever touched.
    pub fn get(&self, labels: &Labels<'_>) -> Option<i64> {
        let key = self.desc.key(labels).ok()?;
        self.map.get(&key).map(|g| g.load(Ordering::Relaxed))
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self, out: &mut String) {
        let name = &self.desc.name;
        write_header(out, name, &self.desc.help, "gauge");
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{}{{{}}} {}", name, render_labels(r.key()), val);
        }
    }
}

impl Gauge for GaugeVec {
    fn increment(&self, labels: &Labels<'_>) -> Result<()> {
        self.add(labels, 1)
    }

    fn decrement(&self, labels: &Labels<'_>) -> Result<()> {
        self.add(labels, -1)
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    // f64 bits; updated with a CAS loop.
    sum: AtomicU64,
    buckets: Vec<AtomicU64>,
}

impl AtomicHistogram {
    fn new(n: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0f64.to_bits()),
            buckets: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn add_sum(&self, v: f64) {
        let mut current = self.sum.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + v).to_bits();
            match self
                .sum
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Snapshot of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    /// Cumulative counts, one per bucket bound (excluding `+Inf`).
    pub buckets: Vec<u64>,
}

pub struct HistogramVec {
    desc: Descriptor,
    bounds: Vec<f64>,
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    pub fn new(name: &str, help: &str, label_names: &[&str], bounds: Vec<f64>) -> Self {
        let mut bounds: Vec<f64> = bounds.into_iter().filter(|b| b.is_finite()).collect();
        bounds.sort_by(|a, b| a.total_cmp(b));
        bounds.dedup();
        Self {
            desc: Descriptor::new(name, help, label_names),
            bounds,
            map: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    pub fn snapshot(&self, labels: &Labels<'_>) -> Option<HistogramSnapshot> {
        let key = self.desc.key(labels).ok()?;
        let hist = self.map.get(&key)?;
        Some(HistogramSnapshot {
            count: hist.count.load(Ordering::Relaxed),
            sum: f64::from_bits(hist.sum.load(Ordering::Relaxed)),
            buckets: hist
                .buckets
                .iter()
                .map(|b| b.load(Ordering::Relaxed))
                .collect(),
        })
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self, out: &mut String) {
        let name = &self.desc.name;
        write_header(out, name, &self.desc.help, "histogram");
        for r in self.map.iter() {
            let hist = r.value();
            let label_str = render_labels(r.key());
            let prefix = if label_str.is_empty() {
                String::new()
            } else {
                format!("{},", label_str)
            };

            for (i, le) in self.bounds.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = f64::from_bits(hist.sum.load(Ordering::Relaxed));
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, label_str, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", name, label_str, count);
        }
    }
}

impl Histogram for HistogramVec {
    fn observe(&self, value: f64, labels: &Labels<'_>) -> Result<()> {
        if value.is_nan() {
            return Err(RouteMetricsError::Internal(format!(
                "NaN observed on {}",
                self.desc.name
            )));
        }
        let key = self.desc.key(labels)?;
        let n = self.bounds.len();
        let hist = self
            .map
            .entry(key)
            .or_insert_with(|| AtomicHistogram::new(n));

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.add_sum(value);

        // Cumulative buckets: increment every bucket whose bound covers the value.
        for (i, &b) in self.bounds.iter().enumerate() {
            if value <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

/// Log-scale bucket bounds `1, 2, 5` per decade over `range`, ending at
/// `10^end`. `BucketRange(0, 2)` gives `1, 2, 5, 10, 20, 50, 100`.
pub fn log_scale(range: BucketRange) -> Vec<f64> {
    let mut out = Vec::new();
    for exp in range.start()..=range.end() {
        for m in [1.0, 2.0, 5.0] {
            if exp == range.end() && m > 1.0 {
                break;
            }
            out.push(scale(m, exp));
        }
    }
    out
}

// Divide for negative exponents so 0.001 stays exactly 0.001.
fn scale(m: f64, exp: i32) -> f64 {
    if exp >= 0 {
        m * 10f64.powi(exp)
    } else {
        m / 10f64.powi(-exp)
    }
}
