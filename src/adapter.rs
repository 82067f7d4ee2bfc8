//! Adapter selection
//!
//! An adapter knows how to instrument one kind of application. The selector
//! probes its adapters in registration order and hands the application to the
//! first one that recognises it. Supporting a new framework means
//! implementing [`FrameworkApp`] for it and registering a
//! [`FrameworkAdapter`]; existing adapters stay untouched.

use crate::error::{RedError, Result};
use crate::metrics::{MetricRegistry, ScrapeLayer};
use crate::middleware::{Grouper, RouteResolutionLayer};
use crate::red::RedMetrics;
use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::any::{type_name, Any};
use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::make::Shared;
use tower::util::BoxCloneSyncService;
use tower::{service_fn, Layer, Service};
use tracing::debug;

/// Type-erased HTTP service, the common currency between adapters.
pub type BoxedHttpService = BoxCloneSyncService<Request<Body>, Response, Infallible>;

/// What a frameworked application must offer to be instrumented with
/// route-pattern grouping.
pub trait FrameworkApp: Sized + Send + 'static {
    /// Adapter name reported by [`Instrumented::adapter`].
    const NAME: &'static str;

    /// Install the route resolution hook so it runs for every request,
    /// including those no route matched.
    fn register_teardown_hook(self, hook: RouteResolutionLayer) -> Self;

    /// Serve the scrape endpoint from the application at `path`.
    ///
    /// Must not fail when the application already handles `path`: the
    /// scrape endpoint takes precedence for `GET`.
    fn register_route(self, path: &str, registry: Arc<MetricRegistry>) -> Self;

    /// Finish the application into a service.
    fn into_service(self) -> BoxedHttpService;
}

impl FrameworkApp for Router {
    const NAME: &'static str = "axum";

    fn register_teardown_hook(self, hook: RouteResolutionLayer) -> Self {
        self.layer(hook)
    }

    fn register_route(self, path: &str, registry: Arc<MetricRegistry>) -> Self {
        self.layer(ScrapeLayer::new(path, registry))
    }

    fn into_service(self) -> BoxedHttpService {
        BoxCloneSyncService::new(self)
    }
}

/// Plain request handler without route information.
///
/// # Example
///
/// ```
/// use redmetrics::Handler;
///
/// let handler = Handler::from_fn(|req: axum::http::Request<axum::body::Body>| async move {
///     format!("you asked for {}", req.uri().path())
/// });
/// # let _ = handler;
/// ```
#[derive(Clone)]
pub struct Handler(BoxedHttpService);

impl Handler {
    /// Wrap an existing service.
    pub fn new<S>(service: S) -> Self
    where
        S: Service<Request<Body>, Response = Response, Error = Infallible>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        Self(BoxCloneSyncService::new(service))
    }

    /// Wrap an async function from request to response.
    pub fn from_fn<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request<Body>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self::new(service_fn(move |request| {
            let future = f(request);
            async move { Ok::<_, Infallible>(future.await.into_response()) }
        }))
    }
}

/// Instruments one kind of application.
pub trait Adapter: Send + Sync {
    /// Short name of the adapter.
    fn name(&self) -> &'static str;

    /// Whether this adapter can instrument `app`.
    fn probe(&self, app: &(dyn Any + Send)) -> bool;

    /// Instrument an application this adapter accepted in [`probe`](Self::probe).
    fn instrument(&self, app: Box<dyn Any + Send>, red: &RedMetrics) -> Result<Instrumented>;
}

/// Adapter for any [`FrameworkApp`]. Groups by route pattern by default.
pub struct FrameworkAdapter<A> {
    _app: PhantomData<fn() -> A>,
}

impl<A> FrameworkAdapter<A> {
    /// Create the adapter.
    pub fn new() -> Self {
        Self { _app: PhantomData }
    }
}

impl<A> Default for FrameworkAdapter<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: FrameworkApp> Adapter for FrameworkAdapter<A> {
    fn name(&self) -> &'static str {
        A::NAME
    }

    fn probe(&self, app: &(dyn Any + Send)) -> bool {
        app.is::<A>()
    }

    fn instrument(&self, app: Box<dyn Any + Send>, red: &RedMetrics) -> Result<Instrumented> {
        let mut app = *app
            .downcast::<A>()
            .map_err(|_| RedError::UnsupportedApplicationType {
                type_name: type_name::<A>(),
            })?;

        if red.mount_metrics_route() {
            debug!(path = red.metrics_path(), adapter = A::NAME, "Mounting scrape endpoint");
            app = app.register_route(red.metrics_path(), red.registry().clone());
        }

        let app = app.register_teardown_hook(RouteResolutionLayer::new());
        let service = red.layer(Grouper::PerPattern).layer(app.into_service());
        Ok(Instrumented::new(service, A::NAME))
    }
}

/// Adapter for [`Handler`]. Groups by raw path; no route information exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerAdapter;

impl Adapter for HandlerAdapter {
    fn name(&self) -> &'static str {
        "handler"
    }

    fn probe(&self, app: &(dyn Any + Send)) -> bool {
        app.is::<Handler>()
    }

    fn instrument(&self, app: Box<dyn Any + Send>, red: &RedMetrics) -> Result<Instrumented> {
        let Handler(inner) = *app
            .downcast::<Handler>()
            .map_err(|_| RedError::UnsupportedApplicationType {
                type_name: type_name::<Handler>(),
            })?;

        let service = red.layer(Grouper::PerPath).layer(inner);
        Ok(Instrumented::new(service, self.name()))
    }
}

/// Ordered set of adapters.
pub struct AdapterSelector {
    adapters: Vec<Box<dyn Adapter>>,
}

impl AdapterSelector {
    /// Selector with no adapters.
    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Selector for axum routers and plain handlers.
    pub fn with_defaults() -> Self {
        Self::empty()
            .register(FrameworkAdapter::<Router>::new())
            .register(HandlerAdapter)
    }

    /// Append an adapter. Earlier adapters win when several accept an app.
    pub fn register<A: Adapter + 'static>(mut self, adapter: A) -> Self {
        self.adapters.push(Box::new(adapter));
        self
    }

    /// Names of the registered adapters, in probe order.
    pub fn adapter_names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Instrument `app` with the first adapter that accepts it.
    ///
    /// # Errors
    ///
    /// [`RedError::UnsupportedApplicationType`] when no adapter accepts it.
    pub fn select<T: Any + Send>(&self, app: T, red: &RedMetrics) -> Result<Instrumented> {
        let app: Box<dyn Any + Send> = Box::new(app);

        match self.adapters.iter().find(|adapter| adapter.probe(&*app)) {
            Some(adapter) => {
                debug!(adapter = adapter.name(), app = type_name::<T>(), "Selected adapter");
                adapter.instrument(app, red)
            }
            None => Err(RedError::UnsupportedApplicationType {
                type_name: type_name::<T>(),
            }),
        }
    }
}

impl Default for AdapterSelector {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// An instrumented application, ready to serve.
#[derive(Clone)]
pub struct Instrumented {
    service: BoxedHttpService,
    adapter: &'static str,
}

impl Instrumented {
    fn new<S>(service: S, adapter: &'static str) -> Self
    where
        S: Service<Request<Body>, Response = Response, Error = Infallible>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        Self {
            service: BoxCloneSyncService::new(service),
            adapter,
        }
    }

    /// Name of the adapter that produced this service.
    pub fn adapter(&self) -> &'static str {
        self.adapter
    }

    /// The underlying service.
    pub fn into_inner(self) -> BoxedHttpService {
        self.service
    }

    /// Make-service for `axum::serve`.
    pub fn into_make_service(self) -> Shared<Self> {
        Shared::new(self)
    }
}

impl Service<Request<Body>> for Instrumented {
    type Response = Response;
    type Error = Infallible;
    type Future = <BoxedHttpService as Service<Request<Body>>>::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        self.service.call(request)
    }
}
