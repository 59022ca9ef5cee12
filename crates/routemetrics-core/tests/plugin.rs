//! Plugin behavior against an in-memory pipeline and registry.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::sync::Arc;
use std::time::Duration;

use routemetrics_core::config::PluginConfig;
use routemetrics_core::metrics::{Gauge, Histogram, HttpMetrics};
use routemetrics_core::plugin::{BoxError, HttpCall, MetricsPlugin};
use routemetrics_core::route::RouteTable;
use routemetrics_core::timing::NanoClock;
use support::{label, RecordingGauge, RecordingHistogram, TestCall, TestPipeline};

async fn ok(status: u16) -> Result<u16, BoxError> {
    Ok(status)
}

struct Fixture {
    total: Arc<RecordingHistogram>,
    in_flight: Arc<RecordingGauge>,
    request_sizes: Arc<RecordingHistogram>,
    response_sizes: Arc<RecordingHistogram>,
    pipeline: TestPipeline,
    routes: RouteTable,
}

impl Fixture {
    fn new(config: PluginConfig) -> Self {
        let total = Arc::new(RecordingHistogram::default());
        let in_flight = Arc::new(RecordingGauge::default());
        let request_sizes = Arc::new(RecordingHistogram::default());
        let response_sizes = Arc::new(RecordingHistogram::default());

        let metrics = HttpMetrics {
            total_requests: Some(total.clone() as Arc<dyn Histogram>),
            in_flight_requests: Some(in_flight.clone() as Arc<dyn Gauge>),
            request_sizes: Some(request_sizes.clone() as Arc<dyn Histogram>),
            response_sizes: Some(response_sizes.clone() as Arc<dyn Histogram>),
        };

        let mut pipeline = TestPipeline::default();
        MetricsPlugin::new(config, metrics).install(&mut pipeline);

        let routes = RouteTable::new();
        routes.register("/users/{id}").unwrap();
        routes.register("/upload").unwrap();

        Self {
            total,
            in_flight,
            request_sizes,
            response_sizes,
            pipeline,
            routes,
        }
    }
}

#[tokio::test]
async fn install_registers_three_hooks() {
    let fx = Fixture::new(PluginConfig::default());
    assert_eq!(fx.pipeline.hook_counts(), (1, 1, 1));
}

#[tokio::test]
async fn empty_metrics_installs_nothing() {
    let mut pipeline = TestPipeline::default();
    MetricsPlugin::new(PluginConfig::default(), HttpMetrics::default()).install(&mut pipeline);
    assert_eq!(pipeline.hook_counts(), (0, 0, 0));
}

#[tokio::test]
async fn records_all_instruments_with_route_template() {
    let fx = Fixture::new(PluginConfig::default());
    let call = TestCall::new("GET", "/users/42", Some(17));
    let route = fx.routes.find(call.path());

    fx.pipeline
        .handle(&call, route, Some(512), || ok(200))
        .await
        .unwrap();

    let total = fx.total.samples();
    assert_eq!(total.len(), 1);
    let (elapsed, labels) = &total[0];
    assert!(*elapsed >= 0.0 && elapsed.is_finite());
    assert_eq!(label(labels, "method"), Some("GET"));
    assert_eq!(label(labels, "response_code"), Some("200"));
    assert_eq!(label(labels, "route"), Some("/users/{id}"));
    assert_eq!(label(labels, "path"), None);

    let req = fx.request_sizes.samples();
    assert_eq!(req.len(), 1);
    assert_eq!(req[0].0, 17.0);

    let resp = fx.response_sizes.samples();
    assert_eq!(resp.len(), 1);
    assert_eq!(resp[0].0, 512.0);
    assert_eq!(label(&resp[0].1, "route"), Some("/users/{id}"));

    assert_eq!(fx.in_flight.total(), 0);
}

#[tokio::test]
async fn concrete_values_never_become_labels() {
    let fx = Fixture::new(PluginConfig::default());
    for id in ["1", "2", "abc"] {
        let path = format!("/users/{id}");
        let call = TestCall::new("GET", &path, None);
        let route = fx.routes.find(&path);
        fx.pipeline
            .handle(&call, route, None, || ok(200))
            .await
            .unwrap();
    }
    let routes: Vec<String> = fx
        .total
        .samples()
        .iter()
        .map(|(_, l)| label(l, "route").unwrap().to_string())
        .collect();
    assert_eq!(routes, vec!["/users/{id}"; 3]);
}

#[tokio::test]
async fn unmatched_route_is_labeled_root() {
    let fx = Fixture::new(PluginConfig::default());
    let call = TestCall::new("GET", "/nope", None);

    fx.pipeline
        .handle(&call, None, None, || ok(404))
        .await
        .unwrap();

    let total = fx.total.samples();
    assert_eq!(label(&total[0].1, "route"), Some("/"));
    assert_eq!(label(&total[0].1, "response_code"), Some("404"));
}

#[tokio::test]
async fn unknown_sizes_are_skipped() {
    let fx = Fixture::new(PluginConfig::default());
    let call = TestCall::new("POST", "/upload", None);
    let route = fx.routes.find("/upload");

    fx.pipeline
        .handle(&call, route, None, || ok(201))
        .await
        .unwrap();

    assert!(fx.request_sizes.samples().is_empty());
    assert!(fx.response_sizes.samples().is_empty());
    assert_eq!(fx.total.samples().len(), 1);
}

#[tokio::test]
async fn path_label_when_enabled() {
    let config = PluginConfig {
        enable_path_label: true,
        ..PluginConfig::default()
    };
    let fx = Fixture::new(config);
    let call = TestCall::new("GET", "/users/42", None);
    let route = fx.routes.find(call.path());

    fx.pipeline
        .handle(&call, route, None, || ok(200))
        .await
        .unwrap();

    let total = fx.total.samples();
    assert_eq!(label(&total[0].1, "path"), Some("/users/42"));
    assert_eq!(label(&total[0].1, "route"), Some("/users/{id}"));
}

#[derive(Debug)]
struct AppError(&'static str);

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for AppError {}

#[tokio::test]
async fn handler_error_passes_through_after_bookkeeping() {
    let fx = Fixture::new(PluginConfig::default());
    let call = TestCall::new("DELETE", "/users/1", None);
    let route = fx.routes.find(call.path());
    let in_flight = fx.in_flight.clone();

    let err = fx
        .pipeline
        .handle(&call, route, Some(0), || async move {
            assert_eq!(in_flight.total(), 1);
            Err::<u16, BoxError>(Box::new(AppError("db down")))
        })
        .await
        .expect_err("handler error must propagate");

    let app = err.downcast_ref::<AppError>().expect("same error type");
    assert_eq!(app.0, "db down");
    assert_eq!(fx.in_flight.total(), 0);

    let total = fx.total.samples();
    assert_eq!(total.len(), 1);
    assert_eq!(label(&total[0].1, "response_code"), Some("500"));
}

#[tokio::test]
async fn in_flight_identity_has_no_status() {
    let fx = Fixture::new(PluginConfig::default());
    let call = TestCall::new("GET", "/users/9", None);
    let route = fx.routes.find(call.path());

    fx.pipeline
        .handle(&call, route, None, || ok(200))
        .await
        .unwrap();

    let sets = fx.in_flight.label_sets();
    assert_eq!(sets.len(), 1);
    assert_eq!(label(&sets[0], "response_code"), None);
    assert_eq!(label(&sets[0], "method"), Some("GET"));
    assert_eq!(label(&sets[0], "route"), Some("/users/{id}"));
}

#[tokio::test]
async fn registry_failure_does_not_reach_the_request() {
    let failing: Arc<dyn Histogram> = Arc::new(RecordingHistogram::failing());
    let metrics = HttpMetrics {
        total_requests: Some(failing.clone()),
        request_sizes: Some(failing.clone()),
        response_sizes: Some(failing),
        in_flight_requests: None,
    };
    let mut pipeline = TestPipeline::default();
    MetricsPlugin::new(PluginConfig::default(), metrics).install(&mut pipeline);

    let call = TestCall::new("GET", "/", Some(3));
    let out = pipeline
        .handle(&call, None, Some(3), || ok(200))
        .await;
    assert!(out.is_ok());
    assert_eq!(call.status(), Some(200));
}

#[tokio::test]
async fn absent_in_flight_still_runs_handler() {
    let total = Arc::new(RecordingHistogram::default());
    let metrics = HttpMetrics {
        total_requests: Some(total.clone() as Arc<dyn Histogram>),
        ..HttpMetrics::default()
    };
    let mut pipeline = TestPipeline::default();
    MetricsPlugin::new(PluginConfig::default(), metrics)
        .with_clock(Arc::new(NanoClock))
        .install(&mut pipeline);

    let call = TestCall::new("GET", "/", None);
    pipeline
        .handle(&call, None, None, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<u16, BoxError>(204)
        })
        .await
        .unwrap();

    let samples = total.samples();
    assert_eq!(samples.len(), 1);
    assert!(samples[0].0 >= 50.0);
    assert_eq!(call.status(), Some(204));
}

#[tokio::test]
async fn concurrent_mixed_outcomes_balance_the_gauge() {
    let fx = Arc::new(Fixture::new(PluginConfig::default()));

    let mut tasks = Vec::new();
    for i in 0..90u64 {
        let fx = Arc::clone(&fx);
        tasks.push(tokio::spawn(async move {
            let call = TestCall::new("GET", "/users/1", Some(i));
            let route = fx.routes.find("/users/1");
            let handling = fx.pipeline.handle(&call, route, Some(i), || async move {
                tokio::time::sleep(Duration::from_millis(i % 5)).await;
                match i % 3 {
                    0 => Ok::<u16, BoxError>(200),
                    1 => Err(Box::new(AppError("nope")) as BoxError),
                    _ => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(200)
                    }
                }
            });
            let _ = tokio::time::timeout(Duration::from_millis(100), handling).await;
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }

    assert_eq!(fx.in_flight.total(), 0);
    // Cancelled calls never reach the observation step.
    assert_eq!(fx.total.samples().len(), 60);
}

#[tokio::test]
async fn failure_without_status_is_recorded_as_server_error() {
    let fx = Fixture::new(PluginConfig::default());
    let plugin = MetricsPlugin::new(
        PluginConfig::default(),
        HttpMetrics {
            total_requests: Some(fx.total.clone() as Arc<dyn Histogram>),
            request_sizes: Some(fx.request_sizes.clone() as Arc<dyn Histogram>),
            ..HttpMetrics::default()
        },
    );

    // Driven directly: no host ever assigns a status to this call.
    let call = TestCall::new("GET", "/x", Some(4));
    let out = plugin
        .around(&call, Box::pin(async { Err::<(), BoxError>("boom".into()) }))
        .await;

    assert_eq!(out.unwrap_err().to_string(), "boom");
    assert_eq!(call.status(), None);

    let total = fx.total.samples();
    assert_eq!(total.len(), 1);
    assert_eq!(label(&total[0].1, "response_code"), Some("500"));
    assert_eq!(label(&total[0].1, "method"), Some("GET"));
    assert_eq!(label(&total[0].1, "route"), Some("/"));

    let req = fx.request_sizes.samples();
    assert_eq!(label(&req[0].1, "response_code"), Some("500"));
}

#[tokio::test]
async fn status_set_by_the_host_wins_over_the_failure_default() {
    let total = Arc::new(RecordingHistogram::default());
    let plugin = MetricsPlugin::new(
        PluginConfig::default(),
        HttpMetrics {
            total_requests: Some(total.clone() as Arc<dyn Histogram>),
            ..HttpMetrics::default()
        },
    );

    let call = TestCall::new("POST", "/x", None);
    let out = plugin
        .around(
            &call,
            Box::pin(async {
                call.set_status(503);
                Err::<(), BoxError>("unavailable".into())
            }),
        )
        .await;

    assert!(out.is_err());
    let samples = total.samples();
    assert_eq!(label(&samples[0].1, "response_code"), Some("503"));
}
