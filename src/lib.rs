//! # redmetrics
//!
//! RED (Rate, Errors, Duration) request metrics for axum applications.
//!
//! Every request that passes through the instrumentation is recorded once in
//! two series sharing the same labels:
//!
//! - `http_requests_total` counter
//! - `http_requests_duration` histogram, in milliseconds
//!
//! Labels are `per` (route group), `hostname`, `domain` (Host header),
//! `method`, `program` and `status`. The `per` label is the matched route
//! template (`/users/{id}`), never the concrete URL, so series count stays
//! bounded by the number of routes. Requests no route matched share
//! `per="/unmatched"`.
//!
//! ## Quick Start
//!
//! ```ignore
//! use axum::{routing::get, Router};
//! use redmetrics::{logging, RedConfig, RedMetrics};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     logging::init(&logging::LoggingConfig::from_env())?;
//!
//!     let red = RedMetrics::from_config(&RedConfig::from_env())?;
//!     let app: Router = Router::new().route("/name/{name}", get(|| async { "hello" }));
//!     let service = red.instrument(app)?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, service.into_make_service()).await?;
//!     Ok(())
//! }
//! ```
//!
//! `GET /metrics` on the same port returns the text exposition format.
//! Scrapes themselves are not recorded.
//!
//! ## Plain handlers
//!
//! Services without route information are wrapped as a [`Handler`] and grouped
//! by raw request path. Anything else is rejected with
//! [`RedError::UnsupportedApplicationType`].

mod adapter;
mod config;
mod error;
pub mod logging;
pub mod metrics;
mod middleware;
mod parse;
mod process;
mod red;
mod router;

// Re-exports
pub use adapter::{
    Adapter, AdapterSelector, BoxedHttpService, FrameworkAdapter, FrameworkApp, Handler,
    HandlerAdapter, Instrumented,
};
pub use config::{RedConfig, RedConfigBuilder};
pub use error::{RedError, Result};
pub use middleware::{
    normalize_pattern, per_path, per_pattern, Grouper, Observation, RedLayer, RedService,
    RequestContext, ResolvedRoute, RouteResolutionLayer, RouteResolutionService, StatusLabel,
    Unobserved, UNMATCHED_ROUTE,
};
pub use parse::{parse_bool, parse_buckets};
pub use process::ProcessIdentity;
pub use red::RedMetrics;
pub use router::RedRouter;
