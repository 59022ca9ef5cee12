//! HTTP instrumentation plugin and the pipeline it attaches to.
//!
//! A host adapts its request pipeline by implementing [`Pipeline`] and
//! [`HttpCall`]. [`MetricsPlugin::install`] registers three hooks:
//!
//! 1. route matched: remember the matched [`RouteNode`] on the call;
//! 2. intercept: wrap the handler with the in-flight guard and the timer,
//!    then record request size and latency;
//! 3. respond: record the response size once the outbound length is known.
//!
//! Per request: `Started -> InFlightTracked -> HandlerInvoked ->
//! {Completed | Failed | Cancelled} -> Observed`. A cancelled request skips
//! `Observed` but still releases its in-flight slot.

use std::sync::{Arc, OnceLock};

use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::config::PluginConfig;
use crate::inflight;
use crate::labels::{LabelSnapshot, RequestLabels};
use crate::metrics::{Histogram, HttpMetrics};
use crate::route::RouteNode;
use crate::timing::{measure_async, MonotonicClock, OsClock};

// Status recorded for a failed handler when the host reports none.
const FAILED_STATUS: u16 = 500;

/// Error raised by a downstream handler. Passed through untouched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of the downstream handler.
pub type HandlerResult = std::result::Result<(), BoxError>;

/// The rest of the pipeline, as seen by an interceptor.
pub type Proceed<'a> = BoxFuture<'a, HandlerResult>;

/// Per-call storage written by hooks.
#[derive(Debug, Default)]
pub struct CallAttributes {
    route: OnceLock<Arc<RouteNode>>,
}

impl CallAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the matched route. Only the first notification wins.
    pub fn set_route(&self, route: Arc<RouteNode>) -> bool {
        self.route.set(route).is_ok()
    }

    pub fn route(&self) -> Option<Arc<RouteNode>> {
        self.route.get().cloned()
    }
}

/// Read-only view of one in-progress HTTP exchange.
pub trait HttpCall: Send + Sync {
    fn method(&self) -> &str;
    fn path(&self) -> &str;
    /// Response status, once the handler has produced one.
    fn status(&self) -> Option<u16>;
    /// Inbound body size, if the transport knows it.
    fn received_bytes(&self) -> Option<u64>;
    fn attributes(&self) -> &CallAttributes;
}

/// Fired once per call after routing; `None` means nothing matched.
pub type RouteMatchedHook<C> = Arc<dyn Fn(&C, Option<Arc<RouteNode>>) + Send + Sync>;

/// Fired when the response is finalized, with its length when known.
pub type RespondHook<C> = Arc<dyn Fn(&C, Option<u64>) + Send + Sync>;

/// Wraps the rest of the pipeline.
pub trait Interceptor<C: ?Sized>: Send + Sync {
    fn intercept<'a>(&'a self, call: &'a C, proceed: Proceed<'a>) -> Proceed<'a>;
}

/// A host request pipeline that accepts hooks.
pub trait Pipeline {
    type Call: HttpCall + 'static;

    fn on_route_matched(&mut self, hook: RouteMatchedHook<Self::Call>);
    fn intercept(&mut self, interceptor: Arc<dyn Interceptor<Self::Call>>);
    fn on_respond(&mut self, hook: RespondHook<Self::Call>);
}

/// Records HTTP metrics for every call passing through a [`Pipeline`].
pub struct MetricsPlugin {
    config: PluginConfig,
    metrics: HttpMetrics,
    clock: Arc<dyn MonotonicClock>,
}

impl MetricsPlugin {
    pub fn new(config: PluginConfig, metrics: HttpMetrics) -> Self {
        Self {
            config,
            metrics,
            clock: Arc::new(OsClock::new()),
        }
    }

    /// Replace the latency clock (defaults to [`OsClock`]).
    pub fn with_clock(mut self, clock: Arc<dyn MonotonicClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register the route-matched, intercept and respond hooks on `pipeline`.
    ///
    /// With no instrument present nothing is registered.
    pub fn install<P: Pipeline>(self, pipeline: &mut P) -> Arc<Self> {
        let plugin = Arc::new(self);
        if plugin.metrics.is_empty() {
            warn!("no http instruments configured; metrics plugin not installed");
            return plugin;
        }

        pipeline.on_route_matched(Arc::new(
            |call: &P::Call, route: Option<Arc<RouteNode>>| {
                if let Some(route) = route {
                    call.attributes().set_route(route);
                }
            },
        ));

        let interceptor: Arc<dyn Interceptor<P::Call>> = plugin.clone();
        pipeline.intercept(interceptor);

        let responder = Arc::clone(&plugin);
        pipeline.on_respond(Arc::new(move |call: &P::Call, length: Option<u64>| {
            responder.on_respond(call, length);
        }));

        info!(
            path_label = plugin.config.enable_path_label,
            total_requests = plugin.metrics.total_requests.is_some(),
            in_flight = plugin.metrics.in_flight_requests.is_some(),
            request_sizes = plugin.metrics.request_sizes.is_some(),
            response_sizes = plugin.metrics.response_sizes.is_some(),
            "metrics plugin installed"
        );
        plugin
    }

    /// Run `proceed` under the in-flight guard and the timer, then record
    /// request size and latency. The handler's result is returned unchanged.
    pub async fn around<C>(&self, call: &C, proceed: Proceed<'_>) -> HandlerResult
    where
        C: HttpCall + ?Sized,
    {
        let gauge = self.metrics.in_flight_requests.as_ref();
        let in_flight_labels = || self.labels(call).in_flight().snapshot();
        let (outcome, elapsed_ms) =
            measure_async(&*self.clock, inflight::guard(gauge, in_flight_labels, proceed)).await;

        let mut labels = self.labels(call);
        // A failure the host has not mapped to a status yet is a server error.
        if outcome.is_err() && labels.status_code.is_none() {
            labels.status_code = Some(FAILED_STATUS);
        }
        let labels = labels.snapshot();

        if let Some(received) = call.received_bytes() {
            self.observe(self.metrics.request_sizes.as_ref(), received as f64, &labels);
        }
        self.observe(self.metrics.total_requests.as_ref(), elapsed_ms, &labels);

        outcome
    }

    /// Late hook: record the response size when the length is known.
    /// Unknown lengths (streaming bodies) are skipped.
    pub fn on_respond<C>(&self, call: &C, content_length: Option<u64>)
    where
        C: HttpCall + ?Sized,
    {
        let Some(length) = content_length else {
            return;
        };
        let labels = self.labels(call).snapshot();
        self.observe(self.metrics.response_sizes.as_ref(), length as f64, &labels);
    }

    fn labels<C: HttpCall + ?Sized>(&self, call: &C) -> RequestLabels {
        RequestLabels::from_call(call, self.config.enable_path_label)
    }

    fn observe(&self, histogram: Option<&Arc<dyn Histogram>>, value: f64, labels: &LabelSnapshot) {
        let Some(histogram) = histogram else {
            return;
        };
        if let Err(e) = histogram.observe(value, &labels.pairs()) {
            debug!(error = %e, kind = e.kind().as_str(), "http observation dropped");
        }
    }
}

impl<C: HttpCall + ?Sized> Interceptor<C> for MetricsPlugin {
    fn intercept<'a>(&'a self, call: &'a C, proceed: Proceed<'a>) -> Proceed<'a> {
        Box::pin(self.around(call, proceed))
    }
}
