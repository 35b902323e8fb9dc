//! # evmcodec-observability
//!
//! Logging and metrics for applications embedding evmcodec.
//!
//! - [`init_tracing`] installs a `tracing-subscriber` built from a [`LogConfig`]
//! - [`CodecMetrics`] is a [`DecodeObserver`](evmcodec_core::DecodeObserver)
//!   that counts requests, error leaves and decodes with OpenTelemetry

pub mod metrics;
pub mod tracing_setup;

pub use metrics::CodecMetrics;
pub use tracing_setup::{init_tracing, LogConfig};
