//! Route tree and route-template labels.
//!
//! A registered route is a chain of [`RouteNode`]s owned by a [`RouteTable`].
//! Children are held by `Arc`, parents by `Weak`, so a node can walk up to
//! the root without keeping the tree alive.
//!
//! The label for a node is its *template*: variable segments keep their
//! placeholder (`{id}`), never the concrete value (`42`). Every concrete path
//! matched by one registered route therefore maps to one label value.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, Weak};

use crate::error::{Result, RouteMetricsError};

/// Selector of a single route segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Literal segment: `users`.
    Constant(String),
    /// Single-segment parameter: `{id}`.
    Parameter(String),
    /// Parameter that may be absent: `{id?}`.
    OptionalParameter(String),
    /// Any single segment: `*`.
    Wildcard,
    /// Rest of the path: `{...}` or `{name...}`.
    Tailcard(Option<String>),
    /// Non-path selector (root, method, header, ...). Contributes nothing
    /// to the template.
    Other(String),
}

impl Selector {
    /// Rendered path segment, or `None` for selectors that are not part of
    /// the path.
    pub fn segment(&self) -> Option<String> {
        match self {
            Selector::Constant(c) => Some(c.clone()),
            Selector::Parameter(name) => Some(format!("{{{name}}}")),
            Selector::OptionalParameter(name) => Some(format!("{{{name}?}}")),
            Selector::Wildcard => Some("*".to_string()),
            Selector::Tailcard(None) => Some("{...}".to_string()),
            Selector::Tailcard(Some(name)) => Some(format!("{{{name}...}}")),
            Selector::Other(_) => None,
        }
    }

    // Lower ranks are tried first when matching.
    fn rank(&self) -> u8 {
        match self {
            Selector::Constant(_) => 0,
            Selector::Parameter(_) => 1,
            Selector::OptionalParameter(_) => 2,
            Selector::Wildcard => 3,
            Selector::Tailcard(_) => 4,
            Selector::Other(_) => 5,
        }
    }

    /// Parse one pattern segment.
    ///
    /// Accepts `{name}`, `{name?}`, `{...}`, `{name...}`, `{*name}`, `*`,
    /// and the colon style `:name` / `*name`.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(RouteMetricsError::InvalidRoute("empty segment".into()));
        }
        if raw == "*" {
            return Ok(Selector::Wildcard);
        }
        if let Some(inner) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if inner == "..." {
                return Ok(Selector::Tailcard(None));
            }
            if let Some(name) = inner.strip_suffix("...") {
                return Ok(Selector::Tailcard(Some(param_name(raw, name)?)));
            }
            if let Some(name) = inner.strip_prefix('*') {
                return Ok(Selector::Tailcard(Some(param_name(raw, name)?)));
            }
            if let Some(name) = inner.strip_suffix('?') {
                return Ok(Selector::OptionalParameter(param_name(raw, name)?));
            }
            return Ok(Selector::Parameter(param_name(raw, inner)?));
        }
        if let Some(name) = raw.strip_prefix(':') {
            return Ok(Selector::Parameter(param_name(raw, name)?));
        }
        if let Some(name) = raw.strip_prefix('*') {
            return Ok(Selector::Tailcard(Some(param_name(raw, name)?)));
        }
        if raw.contains(['{', '}']) {
            return Err(RouteMetricsError::InvalidRoute(format!(
                "unbalanced braces in segment: {raw}"
            )));
        }
        Ok(Selector::Constant(raw.to_string()))
    }
}

fn param_name(raw: &str, name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(RouteMetricsError::InvalidRoute(format!(
            "invalid parameter name in segment: {raw}"
        )));
    }
    Ok(name.to_string())
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.segment() {
            Some(s) => f.write_str(&s),
            None => match self {
                Selector::Other(desc) => write!(f, "({desc})"),
                _ => Ok(()),
            },
        }
    }
}

/// One segment of a registered route.
pub struct RouteNode {
    selector: Selector,
    parent: Weak<RouteNode>,
    children: RwLock<Vec<Arc<RouteNode>>>,
    endpoint: AtomicBool,
}

impl RouteNode {
    fn root() -> Self {
        Self {
            selector: Selector::Other("root".into()),
            parent: Weak::new(),
            children: RwLock::new(Vec::new()),
            endpoint: AtomicBool::new(false),
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Enclosing node, if it is still alive.
    pub fn parent(&self) -> Option<Arc<RouteNode>> {
        self.parent.upgrade()
    }

    /// Whether a route was registered that ends at this node.
    pub fn is_endpoint(&self) -> bool {
        self.endpoint.load(Ordering::Acquire)
    }

    /// Get or create the child with `selector`. Idempotent.
    pub fn child(self: &Arc<Self>, selector: Selector) -> Arc<RouteNode> {
        if let Some(existing) = self.find_child(&selector) {
            return existing;
        }
        let mut children = self
            .children
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Re-check under the write lock: another registrar may have won.
        if let Some(existing) = children.iter().find(|c| c.selector == selector) {
            return Arc::clone(existing);
        }
        let node = Arc::new(RouteNode {
            selector,
            parent: Arc::downgrade(self),
            children: RwLock::new(Vec::new()),
            endpoint: AtomicBool::new(false),
        });
        children.push(Arc::clone(&node));
        children.sort_by_key(|c| c.selector.rank());
        node
    }

    fn find_child(&self, selector: &Selector) -> Option<Arc<RouteNode>> {
        self.read_children()
            .iter()
            .find(|c| &c.selector == selector)
            .cloned()
    }

    fn read_children(&self) -> RwLockReadGuard<'_, Vec<Arc<RouteNode>>> {
        self.children
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Template label of this node, e.g. `/users/{id}`.
    pub fn to_label_string(&self) -> String {
        let parent = self.parent();
        let Some(segment) = self.selector.segment() else {
            return parent
                .map(|p| p.to_label_string())
                .unwrap_or_else(|| "/".to_string());
        };
        let Some(parent) = parent else {
            return format!("/{segment}");
        };
        let mut parent_segment = parent.to_label_string();
        if parent_segment.is_empty() {
            segment
        } else if parent_segment.ends_with('/') {
            parent_segment.push_str(&segment);
            parent_segment
        } else {
            parent_segment.push('/');
            parent_segment.push_str(&segment);
            parent_segment
        }
    }

    /// Template label for an optional node; an unmatched request is `/`.
    pub fn template(node: Option<&RouteNode>) -> String {
        match node {
            Some(n) => n.to_label_string(),
            None => "/".to_string(),
        }
    }
}

impl fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteNode")
            .field("selector", &self.selector)
            .field("template", &self.to_label_string())
            .finish()
    }
}

/// Owner of the route tree.
///
/// Built at startup; afterwards the tree is only read.
pub struct RouteTable {
    root: Arc<RouteNode>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            root: Arc::new(RouteNode::root()),
        }
    }

    pub fn root(&self) -> &Arc<RouteNode> {
        &self.root
    }

    /// Register `pattern` and return its leaf node.
    ///
    /// Registering the same pattern twice returns the same node.
    pub fn register(&self, pattern: &str) -> Result<Arc<RouteNode>> {
        let segments: Vec<&str> = split_path(pattern).collect();
        let mut node = Arc::clone(&self.root);
        for (i, raw) in segments.iter().enumerate() {
            let selector = Selector::parse(raw)?;
            if matches!(selector, Selector::Tailcard(_)) && i + 1 != segments.len() {
                return Err(RouteMetricsError::InvalidRoute(format!(
                    "tail segment must be last: {pattern}"
                )));
            }
            node = node.child(selector);
        }
        node.endpoint.store(true, Ordering::Release);
        Ok(node)
    }

    /// Node previously registered for `pattern`, without creating anything.
    pub fn lookup(&self, pattern: &str) -> Option<Arc<RouteNode>> {
        let mut node = Arc::clone(&self.root);
        for raw in split_path(pattern) {
            let selector = Selector::parse(raw).ok()?;
            node = node.find_child(&selector)?;
        }
        node.is_endpoint().then_some(node)
    }

    /// Match a concrete request path against the registered routes.
    pub fn find(&self, path: &str) -> Option<Arc<RouteNode>> {
        let segments: Vec<&str> = split_path(path).collect();
        match_node(&self.root, &segments)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn match_node(node: &Arc<RouteNode>, segments: &[&str]) -> Option<Arc<RouteNode>> {
    if segments.is_empty() && node.is_endpoint() {
        return Some(Arc::clone(node));
    }
    let children: Vec<Arc<RouteNode>> = node.read_children().clone();
    for child in &children {
        let found = match (child.selector(), segments.split_first()) {
            (Selector::Constant(c), Some((head, rest))) if c == head => match_node(child, rest),
            (Selector::Parameter(_) | Selector::Wildcard, Some((_, rest))) => {
                match_node(child, rest)
            }
            (Selector::OptionalParameter(_), Some((_, rest))) => {
                match_node(child, rest).or_else(|| match_node(child, segments))
            }
            (Selector::OptionalParameter(_), None) => match_node(child, segments),
            (Selector::Tailcard(_), _) if child.is_endpoint() => Some(Arc::clone(child)),
            (Selector::Other(_), _) => match_node(child, segments),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}
