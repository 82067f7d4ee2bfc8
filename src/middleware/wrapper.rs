//! Instrumentation wrapper
//!
//! Wraps a whole application service. Every request that enters is counted
//! and timed exactly once, whatever way it leaves: a response, a downstream
//! error, or the future being dropped before completion. Responses carrying
//! [`Unobserved`] are the exception and are not recorded at all.

use super::context::{InstrumentedMarker, RequestContext, StatusLabel, Unobserved};
use super::grouper::Grouper;
use crate::metrics::{MetricsHandle, RedLabels};
use crate::process::ProcessIdentity;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::debug;

/// One finished request: its label tuple and how long it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Labels shared by the counter and the histogram.
    pub labels: RedLabels,
    /// Time from entering the wrapper to the response being available.
    pub elapsed: Duration,
}

impl Observation {
    /// Elapsed time in fractional milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

#[derive(Debug)]
struct RedState {
    handle: MetricsHandle,
    identity: ProcessIdentity,
    grouper: Grouper,
}

impl RedState {
    fn observe(&self, ctx: &RequestContext, elapsed: Duration) -> Observation {
        let status = ctx.status().unwrap_or(StatusLabel::Error);
        let labels = RedLabels {
            per: self.grouper.group(ctx),
            hostname: self.identity.hostname().to_string(),
            domain: ctx.host().unwrap_or_default().to_string(),
            method: ctx.method().to_string(),
            program: self.identity.program().to_string(),
            status: status.to_string(),
        };
        Observation { labels, elapsed }
    }
}

/// Layer that records `http_requests_total` and `http_requests_duration`.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .route("/users/{id}", get(handler))
///     .layer(RouteResolutionLayer::new())
///     .layer(RedLayer::new(handle, ProcessIdentity::resolve().clone(), Grouper::PerPattern));
/// ```
#[derive(Debug, Clone)]
pub struct RedLayer {
    state: Arc<RedState>,
}

impl RedLayer {
    /// Create a layer recording into `handle`.
    pub fn new(handle: MetricsHandle, identity: ProcessIdentity, grouper: Grouper) -> Self {
        Self {
            state: Arc::new(RedState {
                handle,
                identity,
                grouper,
            }),
        }
    }

    /// Handle the layer records into.
    pub fn handle(&self) -> &MetricsHandle {
        &self.state.handle
    }

    /// Grouper producing the `per` label.
    pub fn grouper(&self) -> &Grouper {
        &self.state.grouper
    }
}

impl<S> Layer<S> for RedLayer {
    type Service = RedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RedService {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Service produced by [`RedLayer`].
#[derive(Debug, Clone)]
pub struct RedService<S> {
    inner: S,
    state: Arc<RedState>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RedService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: 'static,
    ResBody: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        // An outer wrapper already owns this request.
        if request.extensions().get::<InstrumentedMarker>().is_some() {
            return Box::pin(self.inner.call(request));
        }
        request.extensions_mut().insert(InstrumentedMarker);

        let pending = PendingObservation::start(
            self.state.clone(),
            RequestContext::from_request(&request),
        );
        let future = self.inner.call(request);

        Box::pin(async move {
            let result = future.await;
            pending.finish(&result);
            result
        })
    }
}

/// Observation for a request still in flight.
///
/// Dropping it before [`finish`](Self::finish) records the request with
/// status `error`.
struct PendingObservation {
    state: Arc<RedState>,
    ctx: RequestContext,
    started: Instant,
    recorded: bool,
}

impl PendingObservation {
    fn start(state: Arc<RedState>, ctx: RequestContext) -> Self {
        Self {
            state,
            ctx,
            started: Instant::now(),
            recorded: false,
        }
    }

    fn finish<B, E>(mut self, result: &Result<Response<B>, E>) {
        match result {
            Ok(response) if response.extensions().get::<Unobserved>().is_some() => {
                self.recorded = true;
                return;
            }
            Ok(response) => self.ctx.complete_with_response(response),
            Err(_) => {
                debug!(
                    method = %self.ctx.method(),
                    path = %self.ctx.path(),
                    "Downstream service returned an error"
                );
                self.ctx.complete_with_error();
            }
        }
        self.record();
    }

    fn record(&mut self) {
        if self.recorded {
            return;
        }
        self.recorded = true;

        let observation = self.state.observe(&self.ctx, self.started.elapsed());
        self.state
            .handle
            .record_request(&observation.labels, observation.duration_ms());
    }
}

impl Drop for PendingObservation {
    fn drop(&mut self) {
        if !self.recorded {
            debug!(
                method = %self.ctx.method(),
                path = %self.ctx.path(),
                "Request dropped before completion"
            );
            self.ctx.complete_with_error();
            self.record();
        }
    }
}
