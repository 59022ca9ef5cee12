//! Axum adapter for the core `Pipeline` trait.
//!
//! [`AxumPipeline`] collects the hooks a plugin registers and runs them from
//! a single `from_fn` middleware:
//!
//! - route matched: the `MatchedPath` pattern resolved to its `RouteNode`
//!   (unmatched requests report `None`);
//! - interceptors: wrap `next.run(..)`, outermost first;
//! - respond: the response body's exact size hint, else `Content-Length`.
//!
//! Install it with `Router::layer` so every route (and the fallback) sees
//! the middleware after routing.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use axum::{
    body::HttpBody,
    extract::{MatchedPath, Request, State},
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tracing::{debug, warn};

use routemetrics_core::plugin::{
    BoxError, CallAttributes, HttpCall, Interceptor, Pipeline, Proceed, RespondHook, RouteMatchedHook,
};
use routemetrics_core::route::{RouteNode, RouteTable};

/// One request as seen by the hooks.
#[derive(Debug)]
pub struct AxumCall {
    method: String,
    path: String,
    status: OnceLock<u16>,
    received: Option<u64>,
    attributes: CallAttributes,
}

impl AxumCall {
    fn from_request(req: &Request) -> Self {
        let received =
            content_length(req.headers()).or_else(|| req.body().size_hint().exact());
        Self {
            method: req.method().as_str().to_string(),
            path: req.uri().path().to_string(),
            status: OnceLock::new(),
            received,
            attributes: CallAttributes::new(),
        }
    }
}

impl HttpCall for AxumCall {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn status(&self) -> Option<u16> {
        self.status.get().copied()
    }

    fn received_bytes(&self) -> Option<u64> {
        self.received
    }

    fn attributes(&self) -> &CallAttributes {
        &self.attributes
    }
}

#[derive(Clone)]
pub struct AxumPipeline {
    routes: Arc<RouteTable>,
    route_hooks: Vec<RouteMatchedHook<AxumCall>>,
    interceptors: Vec<Arc<dyn Interceptor<AxumCall>>>,
    respond_hooks: Vec<RespondHook<AxumCall>>,
}

impl AxumPipeline {
    /// `routes` is the table the router's patterns are registered in.
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self {
            routes,
            route_hooks: Vec::new(),
            interceptors: Vec::new(),
            respond_hooks: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.route_hooks.is_empty() && self.interceptors.is_empty() && self.respond_hooks.is_empty()
    }

    /// Layer the pipeline over every route of `router`.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        if self.is_empty() {
            return router;
        }
        router.layer(middleware::from_fn_with_state(Arc::new(self), run))
    }

    fn resolve(&self, pattern: &str) -> Option<Arc<RouteNode>> {
        if let Some(node) = self.routes.lookup(pattern) {
            return Some(node);
        }
        // Routes added to the router without going through the table.
        match self.routes.register(pattern) {
            Ok(node) => {
                debug!(%pattern, "route registered on first request");
                Some(node)
            }
            Err(e) => {
                debug!(%pattern, error = %e, "matched path not representable as a route");
                None
            }
        }
    }
}

impl Pipeline for AxumPipeline {
    type Call = AxumCall;

    fn on_route_matched(&mut self, hook: RouteMatchedHook<AxumCall>) {
        self.route_hooks.push(hook);
    }

    fn intercept(&mut self, interceptor: Arc<dyn Interceptor<AxumCall>>) {
        self.interceptors.push(interceptor);
    }

    fn on_respond(&mut self, hook: RespondHook<AxumCall>) {
        self.respond_hooks.push(hook);
    }
}

async fn run(State(pipeline): State<Arc<AxumPipeline>>, req: Request, next: Next) -> Response {
    let call = AxumCall::from_request(&req);

    let route = req
        .extensions()
        .get::<MatchedPath>()
        .and_then(|matched| pipeline.resolve(matched.as_str()));
    for hook in &pipeline.route_hooks {
        hook(&call, route.clone());
    }

    let slot: Mutex<Option<Response>> = Mutex::new(None);
    let mut proceed: Proceed<'_> = Box::pin(async {
        let response = next.run(req).await;
        let _ = call.status.set(response.status().as_u16());
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(response);
        Ok::<(), BoxError>(())
    });
    for interceptor in pipeline.interceptors.iter().rev() {
        proceed = interceptor.intercept(&call, proceed);
    }
    if let Err(e) = proceed.await {
        warn!(method = %call.method, path = %call.path, error = %e, "interceptor failed");
    }

    let response = slot
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response());

    let length = response
        .body()
        .size_hint()
        .exact()
        .or_else(|| content_length(response.headers()));
    for hook in &pipeline.respond_hooks {
        hook(&call, length);
    }
    response
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
