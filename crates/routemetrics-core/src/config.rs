//! Plugin configuration.
//!
//! Deserializable so hosts can embed it in their own config files; unknown
//! fields are rejected at every level.

use serde::Deserialize;

use crate::error::{Result, RouteMetricsError};

/// Settings fixed at install time.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    /// Attach the raw request path as a `path` label. Unbounded cardinality;
    /// off by default.
    #[serde(default)]
    pub enable_path_label: bool,

    #[serde(default)]
    pub http: HttpMetricsConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enable_path_label: false,
            http: HttpMetricsConfig::default(),
        }
    }
}

impl PluginConfig {
    pub fn validate(&self) -> Result<()> {
        self.http.validate()
    }
}

/// Inclusive range of decimal exponents for log-scale buckets.
/// `[0, 4]` yields `1, 2, 5, 10, ..., 5000, 10000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BucketRange(pub i32, pub i32);

impl BucketRange {
    pub fn start(&self) -> i32 {
        self.0
    }

    pub fn end(&self) -> i32 {
        self.1
    }

    fn validate(&self, field: &str) -> Result<()> {
        if self.0 > self.1 {
            return Err(RouteMetricsError::InvalidConfig(format!(
                "{field}: start must not exceed end"
            )));
        }
        if !(-6..=12).contains(&self.0) || !(-6..=12).contains(&self.1) {
            return Err(RouteMetricsError::InvalidConfig(format!(
                "{field}: exponents must be between -6 and 12"
            )));
        }
        Ok(())
    }
}

/// Names, bucket ranges and on/off switches of the standard HTTP metrics.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpMetricsConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "enabled")]
    pub total_requests: bool,
    #[serde(default = "enabled")]
    pub in_flight_requests: bool,
    #[serde(default = "enabled")]
    pub request_sizes: bool,
    #[serde(default = "enabled")]
    pub response_sizes: bool,

    #[serde(default = "default_total_requests_range")]
    pub total_requests_range: BucketRange,
    #[serde(default = "default_size_range")]
    pub request_sizes_range: BucketRange,
    #[serde(default = "default_size_range")]
    pub response_sizes_range: BucketRange,
}

impl Default for HttpMetricsConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            total_requests: true,
            in_flight_requests: true,
            request_sizes: true,
            response_sizes: true,
            total_requests_range: default_total_requests_range(),
            request_sizes_range: default_size_range(),
            response_sizes_range: default_size_range(),
        }
    }
}

impl HttpMetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_metric_prefix(&self.prefix) {
            return Err(RouteMetricsError::InvalidConfig(format!(
                "prefix must match [a-zA-Z_:][a-zA-Z0-9_:]*: {:?}",
                self.prefix
            )));
        }
        self.total_requests_range.validate("total_requests_range")?;
        self.request_sizes_range.validate("request_sizes_range")?;
        self.response_sizes_range.validate("response_sizes_range")?;
        Ok(())
    }

    pub fn total_requests_name(&self) -> String {
        format!("{}_total_requests", self.prefix)
    }

    pub fn in_flight_requests_name(&self) -> String {
        format!("{}_in_flight_requests", self.prefix)
    }

    pub fn request_sizes_name(&self) -> String {
        format!("{}_request_size_bytes", self.prefix)
    }

    pub fn response_sizes_name(&self) -> String {
        format!("{}_response_size_bytes", self.prefix)
    }
}

fn is_valid_metric_prefix(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn default_prefix() -> String {
    "http".into()
}
fn enabled() -> bool {
    true
}
fn default_total_requests_range() -> BucketRange {
    BucketRange(0, 4)
}
fn default_size_range() -> BucketRange {
    BucketRange(0, 6)
}
