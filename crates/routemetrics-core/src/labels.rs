//! Per-request label set.

use std::sync::Arc;

use crate::plugin::HttpCall;
use crate::route::RouteNode;

pub const METHOD: &str = "method";
pub const RESPONSE_CODE: &str = "response_code";
pub const ROUTE: &str = "route";
pub const PATH: &str = "path";

/// Labels attached to one HTTP observation.
///
/// Absent fields are omitted from the rendered pairs rather than emitted
/// as empty strings.
#[derive(Debug, Clone, Default)]
pub struct RequestLabels {
    pub method: Option<String>,
    pub status_code: Option<u16>,
    pub route: Option<Arc<RouteNode>>,
    pub path: Option<String>,
}

impl RequestLabels {
    /// Read the current state of `call`. The raw path is only captured when
    /// `enable_path_label` is set: it is unbounded in cardinality.
    pub fn from_call<C: HttpCall + ?Sized>(call: &C, enable_path_label: bool) -> Self {
        Self {
            method: Some(call.method().to_string()),
            status_code: call.status(),
            route: call.attributes().route(),
            path: enable_path_label.then(|| call.path().to_string()),
        }
    }

    /// Identity labels of an in-flight request: everything known at entry,
    /// without the status code.
    pub fn in_flight(mut self) -> Self {
        self.status_code = None;
        self
    }

    /// Resolve the route template and freeze the label values.
    pub fn snapshot(&self) -> LabelSnapshot {
        let mut pairs = Vec::with_capacity(4);
        if let Some(method) = &self.method {
            pairs.push((METHOD, method.clone()));
        }
        if let Some(code) = self.status_code {
            pairs.push((RESPONSE_CODE, code.to_string()));
        }
        pairs.push((ROUTE, RouteNode::template(self.route.as_deref())));
        if let Some(path) = &self.path {
            pairs.push((PATH, path.clone()));
        }
        LabelSnapshot { pairs }
    }
}

/// Frozen label values, computed once and reused for paired calls
/// (gauge increment and its decrement).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSnapshot {
    pairs: Vec<(&'static str, String)>,
}

impl LabelSnapshot {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Borrowed `(name, value)` view for registry calls.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.pairs.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }
}
