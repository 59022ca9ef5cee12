use std::net::SocketAddr;

use serde::Deserialize;

use routemetrics_core::config::{HttpMetricsConfig, PluginConfig};
use routemetrics_core::error::{Result, RouteMetricsError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RouteMetricsError::UnsupportedVersion);
        }
        self.server.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            RouteMetricsError::InvalidConfig(format!(
                "server.listen must be a valid SocketAddr ({:?}): {e}",
                self.listen
            ))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Scrape endpoint.
    #[serde(default = "default_metrics_path")]
    pub path: String,

    #[serde(default)]
    pub enable_path_label: bool,

    /// Export the `process` group.
    #[serde(default = "enabled")]
    pub process: bool,

    #[serde(default)]
    pub http: HttpMetricsConfig,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            enable_path_label: false,
            process: true,
            http: HttpMetricsConfig::default(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(RouteMetricsError::InvalidConfig(
                "metrics.path must start with '/'".into(),
            ));
        }
        if RESERVED_PATHS.contains(&self.path.as_str()) || self.path.starts_with("/v1/") {
            return Err(RouteMetricsError::InvalidConfig(format!(
                "metrics.path collides with a built-in route: {}",
                self.path
            )));
        }
        self.plugin_config().validate()
    }

    /// The part of this section the instrumentation plugin consumes.
    pub fn plugin_config(&self) -> PluginConfig {
        PluginConfig {
            enable_path_label: self.enable_path_label,
            http: self.http.clone(),
        }
    }
}

const RESERVED_PATHS: [&str; 3] = ["/", "/healthz", "/readyz"];

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_metrics_path() -> String {
    "/metrics".into()
}
fn enabled() -> bool {
    true
}
