//! Router extension
//!
//! Provides the `RedRouter` trait for instrumenting a router in place while it
//! keeps its `Router` type, e.g. before `with_state` or `nest`.

use crate::metrics::ScrapeLayer;
use crate::middleware::{Grouper, RouteResolutionLayer};
use crate::red::RedMetrics;
use axum::Router;

/// Extension trait for applying RED instrumentation to an axum Router.
///
/// # Example
///
/// ```
/// use axum::{routing::get, Router};
/// use redmetrics::{RedConfig, RedMetrics, RedRouter};
///
/// let red = RedMetrics::from_config(&RedConfig::default()).unwrap();
/// let app: Router = Router::new()
///     .route("/users/{id}", get(|| async { "user" }))
///     .with_red_metrics(&red);
/// ```
pub trait RedRouter {
    /// Apply instrumentation to every route added so far.
    ///
    /// Layers are applied in this order:
    /// 1. Scrape endpoint (when enabled)
    /// 2. Route resolution hook
    /// 3. RED wrapper (outermost)
    ///
    /// The scrape endpoint answers `GET` at the metrics path even when the
    /// router already has a route there. Routes added afterwards are not
    /// instrumented.
    fn with_red_metrics(self, red: &RedMetrics) -> Self;
}

impl<S> RedRouter for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_red_metrics(self, red: &RedMetrics) -> Self {
        let mut router = self;

        if red.mount_metrics_route() {
            router = router.layer(ScrapeLayer::new(red.metrics_path(), red.registry().clone()));
        }

        router
            .layer(RouteResolutionLayer::new())
            .layer(red.layer(Grouper::PerPattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedConfig;
    use crate::metrics::HTTP_REQUESTS_TOTAL;
    use axum::body::{to_bytes, Body};
    use axum::extract::State;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_with_red_metrics_on_stateful_router() {
        let red = RedMetrics::from_config(&RedConfig::builder().hostname("h").build()).unwrap();
        let app = Router::new()
            .route("/greet/{name}", get(|State(greeting): State<&'static str>| async move { greeting }))
            .with_red_metrics(&red)
            .with_state("hello");

        let request = Request::builder()
            .uri("/greet/bob")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);

        let all = red.registry().counter(HTTP_REQUESTS_TOTAL).unwrap().get_all();
        assert_eq!(all.len(), 1);
        assert!(all[0].0.contains(r#"per="/greet/{name}""#));
    }

    #[tokio::test]
    async fn test_existing_metrics_route_is_shadowed() {
        let red = RedMetrics::from_config(&RedConfig::builder().hostname("h").build()).unwrap();
        let app: Router = Router::new()
            .route("/metrics", get(|| async { "app metrics" }))
            .with_red_metrics(&red);

        for _ in 0..2 {
            let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), 200);
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_ne!(&body[..], b"app metrics");
        }

        assert_eq!(red.handle().requests_total(), 0);
    }
}
