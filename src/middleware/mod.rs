//! Request instrumentation middleware
//!
//! Two cooperating layers:
//!
//! - [`RouteResolutionLayer`] runs inside the router and publishes the
//!   matched route template
//! - [`RedLayer`] wraps the whole application and records one observation
//!   per request
//!
//! Apply the hook with `Router::layer` first, then the wrapper around it, so
//! the wrapper sees the hook's result on the way out.

mod context;
mod grouper;
mod hook;
mod wrapper;

pub use context::{RequestContext, ResolvedRoute, StatusLabel, Unobserved, UNMATCHED_ROUTE};
pub use grouper::{normalize_pattern, per_path, per_pattern, Grouper};
pub use hook::{RouteResolutionLayer, RouteResolutionService};
pub use wrapper::{Observation, RedLayer, RedService};
