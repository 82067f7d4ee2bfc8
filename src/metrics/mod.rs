//! Request metrics storage and export
//!
//! - Labeled counters and histograms, safe for concurrent recording
//! - The two RED metrics and their fixed label tuple
//! - Prometheus text format export
//! - `/metrics` endpoint for scraping
//!
//! # Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `http_requests_total` | Counter | per, hostname, domain, method, program, status |
//! | `http_requests_duration` | Histogram (ms) | per, hostname, domain, method, program, status |

mod buckets;
mod endpoint;
mod labels;
mod prometheus;
mod registry;
mod types;

pub use buckets::{default_duration_buckets, latency_bins};
pub use endpoint::{
    metrics_router, scrape_handler, scrape_response, serve_metrics, MetricsServer, ScrapeLayer,
    ScrapeService, DEFAULT_METRICS_PATH,
};
pub use labels::{escape_label_value, render_labels, RedLabels, RED_LABEL_NAMES};
pub use prometheus::{export_prometheus, PrometheusExport, TEXT_CONTENT_TYPE};
pub use registry::{
    MetricDef, MetricRegistry, MetricRegistryBuilder, MetricsHandle, HTTP_REQUESTS_DURATION,
    HTTP_REQUESTS_TOTAL,
};
pub use types::{Histogram, HistogramData, LabeledCounter};
