//! Server config loader (strict parsing).

pub mod schema;

use std::fs;

use routemetrics_core::error::{Result, RouteMetricsError};

pub use schema::{MetricsSection, ServerConfig, ServerSection};

/// Default config file, relative to the working directory.
pub const DEFAULT_PATH: &str = "routemetrics.yaml";

/// Environment variable overriding [`DEFAULT_PATH`].
pub const PATH_ENV: &str = "ROUTEMETRICS_CONFIG";

/// Config path: first CLI argument, then `ROUTEMETRICS_CONFIG`, then the default.
pub fn resolve_path(arg: Option<String>, env: Option<String>) -> String {
    arg.filter(|p| !p.is_empty())
        .or(env.filter(|p| !p.is_empty()))
        .unwrap_or_else(|| DEFAULT_PATH.to_string())
}

pub fn load_from_file(path: &str) -> Result<ServerConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RouteMetricsError::Internal(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServerConfig> {
    let cfg: ServerConfig = serde_yaml::from_str(s)
        .map_err(|e| RouteMetricsError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
