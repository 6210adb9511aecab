//! # ringrelay-observability
//!
//! Structured logging for RingRelay binaries.
//!
//! Levels are configurable globally and per component (crate name), and
//! output is either human-readable text or JSON lines for log shippers.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};
