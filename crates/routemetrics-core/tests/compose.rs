//! Metric group composition.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use routemetrics_core::compose::{MetricGroup, Metrics};
use routemetrics_core::config::PluginConfig;

struct Fixed {
    line: &'static str,
    collected: AtomicUsize,
}

impl Fixed {
    fn new(line: &'static str) -> Arc<Self> {
        Arc::new(Self {
            line,
            collected: AtomicUsize::new(0),
        })
    }
}

impl MetricGroup for Fixed {
    fn collect(&self) {
        self.collected.fetch_add(1, Ordering::SeqCst);
    }

    fn render(&self, out: &mut String) {
        out.push_str(self.line);
        out.push('\n');
    }
}

#[test]
fn empty_tree_dumps_nothing() {
    let metrics = Metrics::new();
    metrics.collect();
    assert_eq!(metrics.dump(), "");
    assert!(metrics.group_names().is_empty());
    assert!(metrics.http_metrics().is_empty());
}

#[test]
fn groups_render_in_fixed_order() {
    let http = Fixed::new("http_x 1");
    let process = Fixed::new("process_x 2");
    let custom = Fixed::new("app_x 3");
    let extra = Fixed::new("extra_x 4");

    let metrics = Metrics::new()
        .with_custom(custom.clone())
        .with_process(process.clone())
        .with_http(http.clone(), Default::default())
        .with_group("extra", extra.clone())
        .unwrap();

    assert_eq!(metrics.group_names(), vec!["http", "process", "custom", "extra"]);
    assert_eq!(metrics.dump(), "http_x 1\nprocess_x 2\napp_x 3\nextra_x 4\n");

    metrics.collect();
    for group in [&http, &process, &custom, &extra] {
        assert_eq!(group.collected.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn absent_slots_are_skipped() {
    let process = Fixed::new("process_x 2");
    let metrics = Metrics::new().with_process(process);
    assert_eq!(metrics.group_names(), vec!["process"]);
    assert_eq!(metrics.dump(), "process_x 2\n");
}

#[test]
fn duplicate_group_names_are_rejected() {
    let metrics = Metrics::new()
        .with_group("jobs", Fixed::new("a 1"))
        .unwrap();
    let err = metrics
        .clone()
        .with_group("jobs", Fixed::new("b 1"))
        .err()
        .expect("duplicate must fail");
    assert_eq!(err.kind().as_str(), "INVALID_CONFIG");
    assert!(metrics.with_group("http", Fixed::new("c 1")).is_err());
}

#[test]
fn plugin_config_parses_with_defaults() {
    let cfg: PluginConfig = serde_yaml::from_str("enable_path_label: true\n").unwrap();
    assert!(cfg.enable_path_label);
    assert_eq!(cfg.http.prefix, "http");
    assert_eq!(cfg.http.total_requests_name(), "http_total_requests");
    assert!(cfg.http.in_flight_requests);
    cfg.validate().unwrap();

    let bad: Result<PluginConfig, _> = serde_yaml::from_str("enable_path_lable: true\n");
    assert!(bad.is_err());

    let mut cfg = PluginConfig::default();
    cfg.http.prefix = "9bad".into();
    assert_eq!(cfg.validate().unwrap_err().kind().as_str(), "INVALID_CONFIG");
}
