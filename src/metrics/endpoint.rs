//! Scrape endpoint
//!
//! `GET /metrics` returns the registry in text exposition format. The endpoint
//! can be put in front of the application's own routes with [`ScrapeLayer`]
//! or served from a dedicated listener with [`MetricsServer`].
//!
//! Scrape responses carry [`Unobserved`], so scraping never changes the
//! exposition it returns.

use super::prometheus::{PrometheusExport, TEXT_CONTENT_TYPE};
use super::registry::MetricRegistry;
use crate::error::{RedError, Result};
use crate::middleware::Unobserved;
use axum::{
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::net::TcpListener;
use tower::{Layer, Service};
use tracing::info;

/// Default path of the scrape endpoint.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Handler for the scrape endpoint.
///
/// No authentication and no rate limiting: the endpoint is expected to be
/// reachable only from the collector's network.
///
/// # Example
///
/// ```ignore
/// let app = Router::new().route("/metrics", get({
///     let m = registry.clone();
///     move || scrape_handler(m.clone())
/// }));
/// ```
pub async fn scrape_handler(registry: Arc<MetricRegistry>) -> Response {
    scrape_response(&registry)
}

/// Render the registry into a scrape response marked [`Unobserved`].
pub fn scrape_response(registry: &MetricRegistry) -> Response {
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
        registry.export_prometheus(),
    )
        .into_response();
    response.extensions_mut().insert(Unobserved);
    response
}

/// Layer that answers `GET` (and `HEAD`) at the scrape path before the
/// wrapped service sees the request.
///
/// Applied with `Router::layer` it wraps every route and the fallback, so the
/// scrape path is served whether or not the application has a route there.
/// An application route for `GET {path}` is shadowed. Other methods on the
/// same path still reach the application.
#[derive(Debug, Clone)]
pub struct ScrapeLayer {
    path: Arc<str>,
    registry: Arc<MetricRegistry>,
}

impl ScrapeLayer {
    /// Serve `registry` at `path`.
    pub fn new(path: &str, registry: Arc<MetricRegistry>) -> Self {
        Self {
            path: Arc::from(path),
            registry,
        }
    }
}

impl<S> Layer<S> for ScrapeLayer {
    type Service = ScrapeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ScrapeService {
            inner,
            path: self.path.clone(),
            registry: self.registry.clone(),
        }
    }
}

/// Service produced by [`ScrapeLayer`].
#[derive(Debug, Clone)]
pub struct ScrapeService<S> {
    inner: S,
    path: Arc<str>,
    registry: Arc<MetricRegistry>,
}

impl<S> ScrapeService<S> {
    fn is_scrape<B>(&self, request: &Request<B>) -> bool {
        (request.method() == Method::GET || request.method() == Method::HEAD)
            && request.uri().path() == &*self.path
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for ScrapeService<S>
where
    S: Service<Request<ReqBody>, Response = Response>,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        if self.is_scrape(&request) {
            let response = scrape_response(&self.registry);
            return Box::pin(async move { Ok(response) });
        }
        Box::pin(self.inner.call(request))
    }
}

/// Router that serves only the scrape endpoint at `path`.
pub fn metrics_router(registry: Arc<MetricRegistry>, path: &str) -> Router {
    Router::new().route(path, get(move || scrape_handler(registry.clone())))
}

/// Standalone scrape server on its own listener.
///
/// Useful when the instrumented application should not expose `/metrics`
/// on its public port.
pub struct MetricsServer {
    listener: TcpListener,
    router: Router,
}

impl MetricsServer {
    /// Bind the listener. Port `0` picks a free port, see [`local_addr`](Self::local_addr).
    pub async fn bind(addr: SocketAddr, registry: Arc<MetricRegistry>, path: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RedError::Bind { addr, source })?;

        Ok(Self {
            listener,
            router: metrics_router(registry, path),
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(RedError::Serve)
    }

    /// Serve scrapes until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(address = %addr, "Metrics server started");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(RedError::Serve)?;

        info!(address = %addr, "Metrics server stopped");
        Ok(())
    }
}

/// Bind and serve the scrape endpoint until `shutdown` resolves.
pub async fn serve_metrics<F>(
    addr: SocketAddr,
    registry: Arc<MetricRegistry>,
    path: &str,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    MetricsServer::bind(addr, registry, path).await?.run(shutdown).await
}
