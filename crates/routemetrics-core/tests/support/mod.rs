//! In-memory registry and pipeline shared by the plugin tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use routemetrics_core::error::{Result, RouteMetricsError};
use routemetrics_core::metrics::{Gauge, Histogram, Labels};
use routemetrics_core::plugin::{
    BoxError, CallAttributes, HandlerResult, HttpCall, Interceptor, Pipeline, Proceed,
    RespondHook, RouteMatchedHook,
};
use routemetrics_core::route::RouteNode;

pub type OwnedLabels = Vec<(String, String)>;

fn owned(labels: &Labels<'_>) -> OwnedLabels {
    labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn label<'a>(labels: &'a OwnedLabels, name: &str) -> Option<&'a str> {
    labels
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[derive(Default)]
pub struct RecordingHistogram {
    samples: Mutex<Vec<(f64, OwnedLabels)>>,
    fail: bool,
}

impl RecordingHistogram {
    pub fn failing() -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn samples(&self) -> Vec<(f64, OwnedLabels)> {
        self.samples.lock().unwrap().clone()
    }
}

impl Histogram for RecordingHistogram {
    fn observe(&self, value: f64, labels: &Labels<'_>) -> Result<()> {
        if self.fail {
            return Err(RouteMetricsError::LabelMismatch {
                metric: "recording".into(),
                expected: vec![],
                got: labels.iter().map(|(k, _)| k.to_string()).collect(),
            });
        }
        self.samples.lock().unwrap().push((value, owned(labels)));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingGauge {
    values: Mutex<HashMap<OwnedLabels, i64>>,
    calls: AtomicUsize,
}

impl RecordingGauge {
    /// Sum over every label set.
    pub fn total(&self) -> i64 {
        self.values.lock().unwrap().values().sum()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn label_sets(&self) -> Vec<OwnedLabels> {
        self.values.lock().unwrap().keys().cloned().collect()
    }

    fn add(&self, labels: &Labels<'_>, delta: i64) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.values.lock().unwrap().entry(owned(labels)).or_insert(0) += delta;
    }
}

impl Gauge for RecordingGauge {
    fn increment(&self, labels: &Labels<'_>) -> Result<()> {
        self.add(labels, 1);
        Ok(())
    }

    fn decrement(&self, labels: &Labels<'_>) -> Result<()> {
        self.add(labels, -1);
        Ok(())
    }
}

pub struct TestCall {
    method: String,
    path: String,
    status: Mutex<Option<u16>>,
    received: Option<u64>,
    attributes: CallAttributes,
}

impl TestCall {
    pub fn new(method: &str, path: &str, received: Option<u64>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            status: Mutex::new(None),
            received,
            attributes: CallAttributes::new(),
        }
    }

    pub fn set_status(&self, status: u16) {
        *self.status.lock().unwrap() = Some(status);
    }
}

impl HttpCall for TestCall {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn status(&self) -> Option<u16> {
        *self.status.lock().unwrap()
    }

    fn received_bytes(&self) -> Option<u64> {
        self.received
    }

    fn attributes(&self) -> &CallAttributes {
        &self.attributes
    }
}

/// Minimal host: route hooks, then interceptors around the handler, then
/// respond hooks. A handler error becomes status 500, as a real host would.
#[derive(Default)]
pub struct TestPipeline {
    route_hooks: Vec<RouteMatchedHook<TestCall>>,
    interceptors: Vec<Arc<dyn Interceptor<TestCall>>>,
    respond_hooks: Vec<RespondHook<TestCall>>,
}

impl TestPipeline {
    pub fn hook_counts(&self) -> (usize, usize, usize) {
        (
            self.route_hooks.len(),
            self.interceptors.len(),
            self.respond_hooks.len(),
        )
    }

    pub async fn handle<F, Fut>(
        &self,
        call: &TestCall,
        route: Option<Arc<RouteNode>>,
        response_len: Option<u64>,
        handler: F,
    ) -> HandlerResult
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = std::result::Result<u16, BoxError>> + Send,
    {
        for hook in &self.route_hooks {
            hook(call, route.clone());
        }

        let mut proceed: Proceed<'_> = Box::pin(async move {
            match handler().await {
                Ok(status) => {
                    call.set_status(status);
                    Ok(())
                }
                Err(e) => {
                    call.set_status(500);
                    Err(e)
                }
            }
        });
        for interceptor in self.interceptors.iter().rev() {
            proceed = interceptor.intercept(call, proceed);
        }
        let outcome = proceed.await;

        for hook in &self.respond_hooks {
            hook(call, response_len);
        }
        outcome
    }
}

impl Pipeline for TestPipeline {
    type Call = TestCall;

    fn on_route_matched(&mut self, hook: RouteMatchedHook<TestCall>) {
        self.route_hooks.push(hook);
    }

    fn intercept(&mut self, interceptor: Arc<dyn Interceptor<TestCall>>) {
        self.interceptors.push(interceptor);
    }

    fn on_respond(&mut self, hook: RespondHook<TestCall>) {
        self.respond_hooks.push(hook);
    }
}
