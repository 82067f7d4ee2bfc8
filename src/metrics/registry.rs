//! MetricRegistry - metric registration and recording
//!
//! A registry is an explicit object: create one per process (or one per test)
//! and share it through `Arc`. Series inside it live as long as the registry.

use super::buckets::default_duration_buckets;
use super::labels::{render_labels, RedLabels, RED_LABEL_NAMES};
use super::types::{Histogram, LabeledCounter};
use crate::error::{RedError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Counter of handled requests.
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// Histogram of request durations in milliseconds.
pub const HTTP_REQUESTS_DURATION: &str = "http_requests_duration";

/// Metric definition with metadata.
#[derive(Debug, Clone)]
pub struct MetricDef {
    /// Metric name (e.g., `http_requests_total`)
    pub name: String,
    /// Help text describing the metric
    pub help: String,
    /// Label names for this metric
    pub labels: Vec<String>,
}

impl MetricDef {
    /// Render label values against this definition's label names.
    ///
    /// Fails when the number of values differs from the number of names.
    pub fn label_string(&self, values: &[&str]) -> Result<String> {
        if values.len() != self.labels.len() {
            return Err(RedError::LabelMismatch {
                metric: self.name.clone(),
                expected: self.labels.len(),
                got: values.len(),
            });
        }
        let names: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        Ok(render_labels(&names, values))
    }
}

/// Central registry for request metrics.
///
/// # Example
///
/// ```
/// use redmetrics::metrics::MetricRegistry;
///
/// let metrics = MetricRegistry::builder()
///     .counter("jobs_total", &["status"], "Total jobs processed")
///     .with_red_metrics()
///     .build();
///
/// metrics.increment("jobs_total", &["done"]).unwrap();
/// assert!(metrics.has_counter("http_requests_total"));
/// ```
#[derive(Debug)]
pub struct MetricRegistry {
    counters: HashMap<String, (MetricDef, LabeledCounter)>,
    histograms: HashMap<String, (MetricDef, Histogram)>,
}

impl MetricRegistry {
    /// Create a new builder.
    pub fn builder() -> MetricRegistryBuilder {
        MetricRegistryBuilder::default()
    }

    /// Registry holding only the two RED metrics with default buckets.
    pub fn with_red_defaults() -> Self {
        Self::builder().with_red_metrics().build()
    }

    /// Get a counter by name.
    pub fn counter(&self, name: &str) -> Option<&LabeledCounter> {
        self.counters.get(name).map(|(_, c)| c)
    }

    /// Get a histogram by name.
    pub fn histogram(&self, name: &str) -> Option<&Histogram> {
        self.histograms.get(name).map(|(_, h)| h)
    }

    /// Increment a counter by one, validating label arity.
    pub fn increment(&self, name: &str, values: &[&str]) -> Result<()> {
        let (def, counter) = self
            .counters
            .get(name)
            .ok_or_else(|| RedError::UnknownMetric(name.to_string()))?;
        counter.inc(&def.label_string(values)?);
        Ok(())
    }

    /// Observe a histogram value, validating label arity.
    pub fn observe(&self, name: &str, values: &[&str], value: f64) -> Result<()> {
        let (def, histogram) = self
            .histograms
            .get(name)
            .ok_or_else(|| RedError::UnknownMetric(name.to_string()))?;
        histogram.observe(&def.label_string(values)?, value);
        Ok(())
    }

    /// Iterate over all counters, sorted by metric name.
    pub fn counters(&self) -> Vec<(&MetricDef, &LabeledCounter)> {
        let mut all: Vec<_> = self.counters.values().map(|(def, c)| (def, c)).collect();
        all.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        all
    }

    /// Iterate over all histograms, sorted by metric name.
    pub fn histograms(&self) -> Vec<(&MetricDef, &Histogram)> {
        let mut all: Vec<_> = self.histograms.values().map(|(def, h)| (def, h)).collect();
        all.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        all
    }

    /// Check if a counter exists.
    pub fn has_counter(&self, name: &str) -> bool {
        self.counters.contains_key(name)
    }

    /// Check if a histogram exists.
    pub fn has_histogram(&self, name: &str) -> bool {
        self.histograms.contains_key(name)
    }
}

/// Builder for MetricRegistry.
#[derive(Default)]
pub struct MetricRegistryBuilder {
    counters: Vec<(String, Vec<String>, String)>,
    histograms: Vec<(String, Vec<String>, Vec<f64>, String)>,
    red_buckets: Option<Vec<f64>>,
}

impl MetricRegistryBuilder {
    /// Add a counter metric.
    ///
    /// # Arguments
    ///
    /// * `name` - Metric name (e.g., `requests_total`)
    /// * `labels` - Label names (e.g., `["method", "status"]`)
    /// * `help` - Description of the metric
    pub fn counter(mut self, name: &str, labels: &[&str], help: &str) -> Self {
        self.counters.push((
            name.to_string(),
            labels.iter().map(|s| s.to_string()).collect(),
            help.to_string(),
        ));
        self
    }

    /// Add a histogram metric.
    ///
    /// # Arguments
    ///
    /// * `name` - Metric name (e.g., `job_duration_seconds`)
    /// * `labels` - Label names (e.g., `["kind"]`)
    /// * `buckets` - Histogram bucket boundaries
    /// * `help` - Description of the metric
    pub fn histogram(mut self, name: &str, labels: &[&str], buckets: &[f64], help: &str) -> Self {
        self.histograms.push((
            name.to_string(),
            labels.iter().map(|s| s.to_string()).collect(),
            buckets.to_vec(),
            help.to_string(),
        ));
        self
    }

    /// Include the RED request metrics with the default duration buckets.
    ///
    /// Adds:
    /// - `http_requests_total{per, hostname, domain, method, program, status}` - Counter
    /// - `http_requests_duration{per, hostname, domain, method, program, status}` - Histogram (ms)
    pub fn with_red_metrics(self) -> Self {
        self.with_red_metrics_buckets(&default_duration_buckets())
    }

    /// Include the RED request metrics with explicit duration buckets (ms).
    pub fn with_red_metrics_buckets(mut self, buckets: &[f64]) -> Self {
        self.red_buckets = Some(buckets.to_vec());
        self
    }

    /// Build the MetricRegistry.
    pub fn build(self) -> MetricRegistry {
        let mut counters = HashMap::new();
        let mut histograms = HashMap::new();

        for (name, labels, help) in self.counters {
            let def = MetricDef {
                name: name.clone(),
                help,
                labels,
            };
            counters.insert(name, (def, LabeledCounter::new()));
        }

        for (name, labels, buckets, help) in self.histograms {
            let def = MetricDef {
                name: name.clone(),
                help,
                labels,
            };
            histograms.insert(name, (def, Histogram::new(&buckets)));
        }

        if let Some(buckets) = self.red_buckets {
            let labels: Vec<String> = RED_LABEL_NAMES.iter().map(|s| s.to_string()).collect();

            let total_def = MetricDef {
                name: HTTP_REQUESTS_TOTAL.to_string(),
                help: "Total HTTP requests per path".to_string(),
                labels: labels.clone(),
            };
            counters.insert(
                HTTP_REQUESTS_TOTAL.to_string(),
                (total_def, LabeledCounter::new()),
            );

            let duration_def = MetricDef {
                name: HTTP_REQUESTS_DURATION.to_string(),
                help: "HTTP requests duration per path in milliseconds".to_string(),
                labels,
            };
            histograms.insert(
                HTTP_REQUESTS_DURATION.to_string(),
                (duration_def, Histogram::new(&buckets)),
            );
        }

        MetricRegistry {
            counters,
            histograms,
        }
    }
}

/// Handle to a MetricRegistry for use in middleware and handlers.
///
/// This is a thin wrapper around `Arc<MetricRegistry>` that knows how to
/// record one request observation.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    registry: Arc<MetricRegistry>,
}

impl MetricsHandle {
    /// Create a new handle from a registry.
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self { registry }
    }

    /// Get the underlying registry.
    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Record one request: a counter increment and a duration observation,
    /// both against the same label tuple.
    ///
    /// Registries built without the RED metrics ignore the call.
    pub fn record_request(&self, labels: &RedLabels, duration_ms: f64) {
        let key = labels.render();

        if let Some(counter) = self.registry.counter(HTTP_REQUESTS_TOTAL) {
            counter.inc(&key);
        }
        if let Some(hist) = self.registry.histogram(HTTP_REQUESTS_DURATION) {
            hist.observe(&key, duration_ms);
        }
    }

    /// Requests recorded so far, summed over every label tuple.
    pub fn requests_total(&self) -> u64 {
        self.registry
            .counter(HTTP_REQUESTS_TOTAL)
            .map(LabeledCounter::total)
            .unwrap_or(0)
    }
}

impl From<Arc<MetricRegistry>> for MetricsHandle {
    fn from(registry: Arc<MetricRegistry>) -> Self {
        Self::new(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(per: &str, status: &str) -> RedLabels {
        RedLabels {
            per: per.to_string(),
            hostname: "host".to_string(),
            domain: "example.com".to_string(),
            method: "GET".to_string(),
            program: "prog".to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn test_builder_basic() {
        let registry = MetricRegistry::builder()
            .counter("requests_total", &["method"], "Total requests")
            .histogram("duration_ms", &["method"], &[1.0, 5.0], "Duration")
            .build();

        assert!(registry.has_counter("requests_total"));
        assert!(registry.has_histogram("duration_ms"));
        assert!(!registry.has_counter(HTTP_REQUESTS_TOTAL));
    }

    #[test]
    fn test_red_metrics() {
        let registry = MetricRegistry::with_red_defaults();

        assert!(registry.has_counter(HTTP_REQUESTS_TOTAL));
        assert!(registry.has_histogram(HTTP_REQUESTS_DURATION));
        assert_eq!(
            registry.histogram(HTTP_REQUESTS_DURATION).unwrap().buckets(),
            default_duration_buckets().as_slice()
        );
    }

    #[test]
    fn test_red_metrics_custom_buckets() {
        let registry = MetricRegistry::builder()
            .with_red_metrics_buckets(&[10.0, 100.0])
            .build();

        assert_eq!(
            registry.histogram(HTTP_REQUESTS_DURATION).unwrap().buckets(),
            &[10.0, 100.0]
        );
    }

    #[test]
    fn test_increment_validates_arity() {
        let registry = MetricRegistry::builder()
            .counter("events_total", &["kind", "source"], "Events")
            .build();

        registry.increment("events_total", &["a", "b"]).unwrap();
        assert_eq!(
            registry
                .counter("events_total")
                .unwrap()
                .get("kind=\"a\",source=\"b\""),
            1
        );

        let err = registry.increment("events_total", &["a"]).unwrap_err();
        assert!(matches!(
            err,
            RedError::LabelMismatch { expected: 2, got: 1, .. }
        ));
    }

    #[test]
    fn test_unknown_metric() {
        let registry = MetricRegistry::builder().build();
        assert!(matches!(
            registry.observe("missing", &[], 1.0),
            Err(RedError::UnknownMetric(_))
        ));
    }

    #[test]
    fn test_record_request_shares_label_tuple() {
        let handle = MetricsHandle::new(Arc::new(MetricRegistry::with_red_defaults()));
        let l = labels("/users/{id}", "200");

        handle.record_request(&l, 12.5);

        let registry = handle.registry();
        let counter = registry.counter(HTTP_REQUESTS_TOTAL).unwrap();
        let hist = registry.histogram(HTTP_REQUESTS_DURATION).unwrap();

        assert_eq!(counter.get(&l.render()), 1);
        assert_eq!(hist.count(&l.render()), 1);
        assert_eq!(counter.get_all()[0].0, hist.get_all()[0].labels);
    }

    #[test]
    fn test_requests_total_sums_series() {
        let handle = MetricsHandle::new(Arc::new(MetricRegistry::with_red_defaults()));

        handle.record_request(&labels("/a", "200"), 1.0);
        handle.record_request(&labels("/a", "500"), 1.0);
        handle.record_request(&labels("/b", "200"), 1.0);

        assert_eq!(handle.requests_total(), 3);
    }

    #[test]
    fn test_record_without_red_metrics_is_ignored() {
        let handle = MetricsHandle::new(Arc::new(MetricRegistry::builder().build()));
        handle.record_request(&labels("/", "200"), 1.0);
        assert_eq!(handle.requests_total(), 0);
    }
}
