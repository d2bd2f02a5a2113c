//! Logging setup for the decree control plane.
//!
//! Structured logging via the `tracing` ecosystem, with human-readable
//! output for interactive use and JSON output for log shippers.

pub mod logging;
