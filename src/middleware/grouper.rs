//! Route grouping
//!
//! Turns a request context into the `per` label. Grouping by matched route
//! template keeps the number of series bounded by the number of registered
//! routes; grouping by raw path produces one series per distinct URL and is
//! only a fallback for applications without route resolution.

use super::context::{RequestContext, ResolvedRoute, UNMATCHED_ROUTE};
use std::fmt;
use std::sync::Arc;

/// Strategy for deriving the `per` label. Groupers must be pure.
#[derive(Clone)]
pub enum Grouper {
    /// Normalized route template written by the resolution hook.
    PerPattern,
    /// Raw request path. Unbounded cardinality.
    PerPath,
    /// Caller-supplied function.
    Custom(Arc<dyn Fn(&RequestContext) -> String + Send + Sync>),
}

impl Grouper {
    /// Wrap a function as a grouper.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> String + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Compute the `per` label for a request.
    pub fn group(&self, ctx: &RequestContext) -> String {
        match self {
            Self::PerPattern => per_pattern(ctx),
            Self::PerPath => per_path(ctx),
            Self::Custom(f) => f(ctx),
        }
    }
}

impl fmt::Debug for Grouper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerPattern => f.write_str("PerPattern"),
            Self::PerPath => f.write_str("PerPath"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Group by matched route template.
///
/// Returns `/unmatched` when no route matched or no hook ran.
pub fn per_pattern(ctx: &RequestContext) -> String {
    match ctx.route() {
        Some(ResolvedRoute::Matched(pattern)) => normalize_pattern(pattern),
        _ => UNMATCHED_ROUTE.to_string(),
    }
}

/// Group by raw request path, unmodified.
pub fn per_path(ctx: &RequestContext) -> String {
    ctx.path().to_string()
}

/// Rewrite framework placeholder syntax into `{name}` form.
///
/// # Normalization Rules
///
/// 1. `<name>` and `<converter:name>` anywhere in a segment → `{name}`
/// 2. `:name` segments → `{name}`
/// 3. `*name` segments → `{*name}`
/// 4. `{name}` and `{*name}` are left as they are
///
/// # Examples
///
/// ```
/// use redmetrics::normalize_pattern;
///
/// assert_eq!(normalize_pattern("/name/<name>"), "/name/{name}");
/// assert_eq!(normalize_pattern("/users/<int:id>/posts"), "/users/{id}/posts");
/// assert_eq!(normalize_pattern("/users/:id"), "/users/{id}");
/// assert_eq!(normalize_pattern("/assets/*path"), "/assets/{*path}");
/// assert_eq!(normalize_pattern("/users/{id}"), "/users/{id}");
/// ```
pub fn normalize_pattern(pattern: &str) -> String {
    replace_angle_placeholders(pattern)
        .split('/')
        .map(normalize_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn replace_angle_placeholders(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(open) = rest.find('<') {
        let Some(len) = rest[open..].find('>') else {
            break;
        };
        let inner = &rest[open + 1..open + len];
        let name = inner.rsplit(':').next().unwrap_or(inner);

        out.push_str(&rest[..open]);
        out.push('{');
        out.push_str(name);
        out.push('}');
        rest = &rest[open + len + 1..];
    }

    out.push_str(rest);
    out
}

fn normalize_segment(segment: &str) -> String {
    if let Some(name) = segment.strip_prefix(':').filter(|n| !n.is_empty()) {
        format!("{{{name}}}")
    } else if let Some(name) = segment.strip_prefix('*').filter(|n| !n.is_empty()) {
        format!("{{*{name}}}")
    } else {
        segment.to_string()
    }
}
