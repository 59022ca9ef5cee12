//! routemetrics server library entry.
//!
//! Wires the concrete metrics registry, the axum pipeline adapter and the
//! instrumentation plugin into a small HTTP server. It is intended to be
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod demo;
pub mod error;
pub mod obs;
pub mod ops;
pub mod pipeline;
pub mod router;
