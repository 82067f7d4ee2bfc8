//! End-to-end request instrumentation scenarios.

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response, StatusCode};
use axum::routing::get;
use axum::Router;
use redmetrics::metrics::{HTTP_REQUESTS_DURATION, HTTP_REQUESTS_TOTAL};
use redmetrics::{Handler, Instrumented, RedConfig, RedError, RedMetrics};
use std::convert::Infallible;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::{Layer, Service, ServiceExt};

fn red() -> RedMetrics {
    let config = RedConfig::builder()
        .hostname("test-host")
        .program("test-prog")
        .build();
    RedMetrics::from_config(&config).unwrap()
}

fn app() -> Router {
    Router::new()
        .route("/name/{name}", get(|| async { "hello" }))
        .route(
            "/teapot",
            get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }),
        )
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", "example.test")
        .body(Body::empty())
        .unwrap()
}

async fn send(service: &Instrumented, uri: &str) -> Response<Body> {
    service.clone().oneshot(get_request(uri)).await.unwrap()
}

async fn scrape(service: &Instrumented) -> String {
    let response = send(service, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

fn series(red: &RedMetrics) -> Vec<(String, u64)> {
    red.registry()
        .counter(HTTP_REQUESTS_TOTAL)
        .unwrap()
        .get_all()
}

#[tokio::test]
async fn test_matched_route_uses_pattern() {
    let red = red();
    let service = red.instrument(app()).unwrap();

    let response = send(&service, "/name/alice").await;
    assert_eq!(response.status(), StatusCode::OK);

    let series = series(&red);
    assert_eq!(series.len(), 1);
    assert_eq!(
        series[0].0,
        r#"per="/name/{name}",hostname="test-host",domain="example.test",method="GET",program="test-prog",status="200""#
    );
}

#[tokio::test]
async fn test_status_is_handler_status() {
    let red = red();
    let service = red.instrument(app()).unwrap();

    send(&service, "/teapot").await;
    assert!(series(&red)[0].0.contains(r#"status="418""#));
}

#[tokio::test]
async fn test_unmatched_route_uses_sentinel() {
    let red = red();
    let service = red.instrument(app()).unwrap();

    let response = send(&service, "/unknown-path").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let series = series(&red);
    assert_eq!(series.len(), 1);
    assert!(series[0].0.starts_with(r#"per="/unmatched","#));
    assert!(series[0].0.ends_with(r#"status="404""#));
}

#[tokio::test]
async fn test_distinct_urls_share_one_series() {
    let red = red();
    let service = red.instrument(app()).unwrap();

    for name in ["alice", "bob", "carol", "dave"] {
        send(&service, &format!("/name/{name}")).await;
    }

    let series = series(&red);
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].1, 4);
}

#[tokio::test]
async fn test_counter_and_histogram_share_labels() {
    let red = red();
    let service = red.instrument(app()).unwrap();

    send(&service, "/name/alice").await;
    send(&service, "/teapot").await;
    send(&service, "/nowhere").await;

    let counter_keys: Vec<String> = series(&red).into_iter().map(|(key, _)| key).collect();
    let hist = red.registry().histogram(HTTP_REQUESTS_DURATION).unwrap();
    let hist_keys: Vec<String> = hist.get_all().into_iter().map(|data| data.labels).collect();

    assert_eq!(counter_keys.len(), 3);
    assert_eq!(counter_keys, hist_keys);
    for key in &counter_keys {
        assert_eq!(hist.count(key), 1);
    }
}

#[tokio::test]
async fn test_scrape_reports_request_count() {
    let red = red();
    let service = red.instrument(app()).unwrap();

    for _ in 0..5 {
        send(&service, "/name/alice").await;
    }

    let text = scrape(&service).await;
    assert!(text.contains("# TYPE http_requests_total counter"));
    assert!(text.contains("# TYPE http_requests_duration histogram"));
    assert!(text.contains(
        r#"http_requests_total{per="/name/{name}",hostname="test-host",domain="example.test",method="GET",program="test-prog",status="200"} 5"#
    ));
}

#[tokio::test]
async fn test_scrape_is_idempotent() {
    let red = red();
    let service = red.instrument(app()).unwrap();
    send(&service, "/name/alice").await;
    send(&service, "/unknown-path").await;

    let first = scrape(&service).await;
    let second = scrape(&service).await;

    assert_eq!(first, second);
    assert!(first.contains(r#"per="/name/{name}""#));
    assert!(!first.contains(r#"per="/metrics""#));
    assert_eq!(series(&red).len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_lose_no_updates() {
    const N: u64 = 200;

    let red = red();
    let service = red.instrument(app()).unwrap();

    let tasks: Vec<_> = (0..N)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let uri = if i % 2 == 0 { "/name/x" } else { "/missing" };
                service.oneshot(get_request(uri)).await.unwrap();
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(red.handle().requests_total(), N);
    let hist = red.registry().histogram(HTTP_REQUESTS_DURATION).unwrap();
    let observed: u64 = hist.get_all().iter().map(|data| data.count).sum();
    assert_eq!(observed, N);
}

#[tokio::test]
async fn test_handler_groups_by_raw_path() {
    let red = red();
    let handler = Handler::from_fn(|_req: Request<Body>| async { StatusCode::ACCEPTED });
    let service = red.instrument(handler).unwrap();

    send(&service, "/users/1").await;
    send(&service, "/users/2").await;

    let keys: Vec<String> = series(&red).into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys.len(), 2);
    assert!(keys[0].starts_with(r#"per="/users/1","#));
    assert!(keys[1].starts_with(r#"per="/users/2","#));
    assert!(keys.iter().all(|key| key.ends_with(r#"status="202""#)));
}

#[tokio::test]
async fn test_handler_has_no_scrape_route() {
    let red = red();
    let handler = Handler::from_fn(|_req: Request<Body>| async { "plain" });
    let service = red.instrument(handler).unwrap();

    let response = send(&service, "/metrics").await;
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"plain");
}

#[test]
fn test_unsupported_application_type() {
    let red = red();
    let err = red.instrument(String::from("not an app")).err().unwrap();
    assert!(matches!(err, RedError::UnsupportedApplicationType { .. }));
    assert!(err.to_string().contains("alloc::string::String"));
}

#[tokio::test]
async fn test_failing_service_records_error() {
    let red = red();
    let service = tower::service_fn(|_req: Request<Body>| async {
        Err::<Response<Body>, _>(std::io::Error::other("backend down"))
    });
    let service = red.layer(redmetrics::Grouper::PerPath).layer(service);

    let err = service.oneshot(get_request("/orders")).await.unwrap_err();
    assert_eq!(err.to_string(), "backend down");

    let series = series(&red);
    assert_eq!(series.len(), 1);
    assert!(series[0].0.contains(r#"per="/orders""#));
    assert!(series[0].0.ends_with(r#"status="error""#));
}

#[tokio::test]
async fn test_abandoned_request_records_error_once() {
    let red = red();
    let slow = tower::service_fn(|_req: Request<Body>| async {
        std::future::pending::<Result<Response<Body>, Infallible>>().await
    });
    let mut service = red.layer(redmetrics::Grouper::PerPath).layer(slow);

    let pending = service.ready().await.unwrap().call(get_request("/slow"));
    let result = tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;
    assert!(result.is_err());

    let series = series(&red);
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].1, 1);
    assert!(series[0].0.ends_with(r#"status="error""#));
}

#[tokio::test]
async fn test_nested_instrumentation_records_once() {
    let red = red();
    let inner: Router = app().layer(red.layer(redmetrics::Grouper::PerPath));
    let service = red.instrument(inner).unwrap();

    send(&service, "/name/alice").await;

    assert_eq!(red.handle().requests_total(), 1);
    assert!(series(&red)[0].0.starts_with(r#"per="/name/{name}","#));
}

#[tokio::test]
async fn test_served_over_tcp() {
    let red = red();
    let service = red.instrument(app()).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, service.into_make_service())
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
            .unwrap();
    });

    let raw_get = |path: &'static str| async move {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request =
            format!("GET {path} HTTP/1.1\r\nHost: example.test\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    };

    let response = raw_get("/name/alice").await;
    assert!(response.starts_with("HTTP/1.1 200"));

    let response = raw_get("/metrics").await;
    assert!(response.contains("text/plain; version=0.0.4"));
    assert!(response.contains(r#"per="/name/{name}""#));

    stop_tx.send(()).unwrap();
    server.await.unwrap();
}
