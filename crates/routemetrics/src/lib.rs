//! Top-level facade crate for routemetrics.
//!
//! Re-exports the instrumentation core and the server library so users can depend on a single crate.

pub mod core {
    pub use routemetrics_core::*;
}

pub mod server {
    pub use routemetrics_server::*;
}
