//! Route resolution hook
//!
//! Runs inside the router, after route matching, and publishes the matched
//! route template to the instrumentation wrapper outside the router. The
//! outcome travels in the response extensions so no state is shared between
//! requests.

use super::context::ResolvedRoute;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that records which route template handled a request.
///
/// Must be applied with `Router::layer` so that it sees axum's
/// [`MatchedPath`]. Requests reaching the fallback carry no matched path and
/// resolve to [`ResolvedRoute::Unmatched`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteResolutionLayer;

impl RouteResolutionLayer {
    /// Create the layer.
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RouteResolutionLayer {
    type Service = RouteResolutionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RouteResolutionService { inner }
    }
}

/// Service produced by [`RouteResolutionLayer`].
#[derive(Debug, Clone)]
pub struct RouteResolutionService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RouteResolutionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let route = ResolvedRoute::from_matched_path(request.extensions().get::<MatchedPath>());
        let future = self.inner.call(request);

        Box::pin(async move {
            let mut response = future.await?;
            // The innermost hook of nested routers knows the full template.
            if response.extensions().get::<ResolvedRoute>().is_none() {
                response.extensions_mut().insert(route);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_matched_route_is_published() {
        let app = Router::new()
            .route("/name/{name}", get(|| async { "hi" }))
            .layer(RouteResolutionLayer::new());

        let response = app.oneshot(request("/name/alice")).await.unwrap();
        assert_eq!(
            response.extensions().get::<ResolvedRoute>(),
            Some(&ResolvedRoute::Matched("/name/{name}".to_string()))
        );
    }

    #[tokio::test]
    async fn test_fallback_is_unmatched() {
        let app = Router::new()
            .route("/name/{name}", get(|| async { "hi" }))
            .layer(RouteResolutionLayer::new());

        let response = app.oneshot(request("/unknown-path")).await.unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(
            response.extensions().get::<ResolvedRoute>(),
            Some(&ResolvedRoute::Unmatched)
        );
    }

    #[tokio::test]
    async fn test_existing_resolution_is_kept() {
        let inner = tower::service_fn(|_req: Request<Body>| async {
            let mut response = Response::new(Body::empty());
            response
                .extensions_mut()
                .insert(ResolvedRoute::Matched("/inner/{id}".to_string()));
            Ok::<_, std::convert::Infallible>(response)
        });

        let service = RouteResolutionLayer::new().layer(inner);
        let response = service.oneshot(request("/inner/1")).await.unwrap();
        assert_eq!(
            response.extensions().get::<ResolvedRoute>(),
            Some(&ResolvedRoute::Matched("/inner/{id}".to_string()))
        );
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let inner = tower::service_fn(|_req: Request<Body>| async {
            Err::<Response<Body>, _>("downstream failed")
        });

        let service = RouteResolutionLayer::new().layer(inner);
        let err = service.oneshot(request("/")).await.unwrap_err();
        assert_eq!(err, "downstream failed");
    }
}
