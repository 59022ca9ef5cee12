//! Axum router wiring.
//!
//! Every route pattern is registered in the shared `RouteTable` as it is
//! added to the router, so the metrics pipeline resolves matched paths to
//! route nodes without creating new ones at request time.

use std::sync::Arc;

use axum::{
    routing::{get, post, MethodRouter},
    Router,
};

use routemetrics_core::error::Result;
use routemetrics_core::plugin::MetricsPlugin;
use routemetrics_core::route::RouteTable;

use crate::{app_state::AppState, demo, ops, pipeline::AxumPipeline};

struct Routes<'a> {
    table: &'a RouteTable,
    router: Router<AppState>,
}

impl<'a> Routes<'a> {
    fn new(table: &'a RouteTable) -> Self {
        Self {
            table,
            router: Router::new(),
        }
    }

    fn route(mut self, pattern: &str, method_router: MethodRouter<AppState>) -> Result<Self> {
        self.table.register(pattern)?;
        self.router = self.router.route(pattern, method_router);
        Ok(self)
    }
}

pub fn build_router(state: AppState) -> Result<Router> {
    let table = Arc::new(RouteTable::new());
    let metrics_path = state.cfg().metrics.path.clone();

    let routes = Routes::new(&table)
        .route("/healthz", get(ops::healthz))?
        .route("/readyz", get(ops::readyz))?
        .route(&metrics_path, get(ops::metrics))?
        .route("/v1/users/:id", get(demo::get_user))?
        .route("/v1/files/*path", get(demo::get_file))?
        .route("/v1/echo", post(demo::echo))?;
    let router = routes.router.fallback(demo::not_found);

    let mut pipeline = AxumPipeline::new(Arc::clone(&table));
    MetricsPlugin::new(
        state.cfg().metrics.plugin_config(),
        state.metrics().http_metrics(),
    )
    .install(&mut pipeline);

    Ok(pipeline.apply(router).with_state(state))
}
