//! routemetrics core: transport-agnostic HTTP instrumentation.
//!
//! This crate derives low-cardinality route labels, times handlers, keeps
//! the in-flight gauge balanced and wires all of it into any request
//! pipeline that implements [`plugin::Pipeline`]. Registry primitives are
//! reached only through the traits in [`metrics`] and [`compose`].
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Instrumentation
//! runs on every request; a metrics bug must never take a request down with
//! it, so every fallible path surfaces as `RouteMetricsError`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod compose;
pub mod config;
pub mod error;
pub mod inflight;
pub mod labels;
pub mod metrics;
pub mod plugin;
pub mod route;
pub mod timing;

/// Shared result type.
pub use error::{Result, RouteMetricsError};
