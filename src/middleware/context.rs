//! Request-scoped context
//!
//! One [`RequestContext`] exists per in-flight request. The wrapper fills it
//! from the request before dispatch and completes it from the response; the
//! route resolution hook contributes the matched route through the
//! response extensions.

use axum::extract::MatchedPath;
use axum::http::{header, Request, Response};
use std::fmt;

/// Label used when no route matched the request.
pub const UNMATCHED_ROUTE: &str = "/unmatched";

/// Route resolution outcome written by the hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRoute {
    /// The framework matched a registered route template.
    Matched(String),
    /// No route matched (e.g. a 404 from the fallback).
    Unmatched,
}

impl ResolvedRoute {
    /// Outcome from axum's matched path extension.
    pub fn from_matched_path(matched: Option<&MatchedPath>) -> Self {
        match matched {
            Some(path) if !path.as_str().is_empty() => Self::Matched(path.as_str().to_string()),
            _ => Self::Unmatched,
        }
    }

    /// Route template, or the unmatched sentinel.
    pub fn pattern(&self) -> &str {
        match self {
            Self::Matched(pattern) => pattern,
            Self::Unmatched => UNMATCHED_ROUTE,
        }
    }
}

/// Value of the `status` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    /// Status code of the response returned downstream.
    Code(u16),
    /// The downstream service failed or was abandoned before responding.
    Error,
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Marks a request as already instrumented so nested wrappers pass through.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InstrumentedMarker;

/// Response extension telling the wrapper not to record the request.
///
/// Set on scrape responses. Handlers may set it on other responses that
/// should stay out of the series, e.g. health checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unobserved;

/// Everything the grouper and the label builder may read about a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    method: String,
    path: String,
    host: Option<String>,
    route: Option<ResolvedRoute>,
    status: Option<StatusLabel>,
}

impl RequestContext {
    /// Context with only method and path set.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            host: None,
            route: None,
            status: None,
        }
    }

    /// Capture method, raw path and host from an inbound request.
    ///
    /// The host comes from the `Host` header, falling back to the URI
    /// authority (HTTP/2 requests carry it there).
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()));

        Self {
            method: request.method().as_str().to_string(),
            path: request.uri().path().to_string(),
            host,
            route: None,
            status: None,
        }
    }

    /// Set the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the resolved route.
    pub fn with_route(mut self, route: ResolvedRoute) -> Self {
        self.route = Some(route);
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: StatusLabel) -> Self {
        self.status = Some(status);
        self
    }

    /// Request method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Raw request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Host the request was addressed to.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Route resolution outcome; `None` when no hook ran.
    pub fn route(&self) -> Option<&ResolvedRoute> {
        self.route.as_ref()
    }

    /// Status, once the request completed.
    pub fn status(&self) -> Option<StatusLabel> {
        self.status
    }

    /// Complete from a downstream response.
    pub(crate) fn complete_with_response<B>(&mut self, response: &Response<B>) {
        self.status = Some(StatusLabel::Code(response.status().as_u16()));
        self.route = response.extensions().get::<ResolvedRoute>().cloned();
    }

    /// Complete without a response.
    pub(crate) fn complete_with_error(&mut self) {
        self.status = Some(StatusLabel::Error);
    }
}
