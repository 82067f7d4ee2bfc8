//! Error types for redmetrics

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for redmetrics operations
pub type Result<T> = std::result::Result<T, RedError>;

/// Errors raised while setting up or exporting request metrics.
///
/// Request handling itself never produces a `RedError`: downstream failures
/// pass through the instrumentation unchanged.
#[derive(Error, Debug)]
pub enum RedError {
    /// No adapter recognises the application handed to the selector
    #[error("Unsupported application type `{type_name}`: no adapter can instrument it")]
    UnsupportedApplicationType { type_name: &'static str },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metric name not present in the registry
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Label values do not match the metric's label names
    #[error("Metric {metric} expects {expected} label values, got {got}")]
    LabelMismatch {
        metric: String,
        expected: usize,
        got: usize,
    },

    /// Metrics listener could not be bound
    #[error("Failed to bind metrics listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Metrics server failed while running
    #[error("Metrics server error: {0}")]
    Serve(#[source] io::Error),

    /// Tracing subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}
