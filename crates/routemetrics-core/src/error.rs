//! Shared error type across routemetrics crates.

use thiserror::Error;

/// Stable, low-cardinality error kind (used in logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Observation rejected because labels do not match the metric's declaration.
    LabelMismatch,
    /// Route pattern could not be parsed.
    InvalidRoute,
    /// Configuration failed validation.
    InvalidConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::LabelMismatch => "LABEL_MISMATCH",
            ErrorKind::InvalidRoute => "INVALID_ROUTE",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RouteMetricsError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum RouteMetricsError {
    #[error("label mismatch on {metric}: expected {expected:?}, got {got:?}")]
    LabelMismatch {
        metric: String,
        expected: Vec<String>,
        got: Vec<String>,
    },
    #[error("invalid route: {0}")]
    InvalidRoute(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl RouteMetricsError {
    /// Map the error to its stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteMetricsError::LabelMismatch { .. } => ErrorKind::LabelMismatch,
            RouteMetricsError::InvalidRoute(_) => ErrorKind::InvalidRoute,
            RouteMetricsError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            RouteMetricsError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
            RouteMetricsError::Internal(_) => ErrorKind::Internal,
        }
    }
}
