//! Prometheus text format export
//!
//! Converts MetricRegistry data to the text exposition format (0.0.4).
//! Metrics and series are emitted in sorted order so two scrapes with no
//! intervening observations are byte-identical.

use super::registry::MetricRegistry;
use super::types::HistogramData;
use std::fmt::Write;

/// Content type of the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Export metrics in Prometheus text format.
///
/// # Example Output
///
/// ```text
/// # HELP http_requests_total Total HTTP requests per path
/// # TYPE http_requests_total counter
/// http_requests_total{per="/name/{name}",hostname="web-1",domain="localhost",method="GET",program="app",status="200"} 42
///
/// # HELP http_requests_duration HTTP requests duration per path in milliseconds
/// # TYPE http_requests_duration histogram
/// http_requests_duration_bucket{per="/name/{name}",...,le="0.25"} 10
/// http_requests_duration_bucket{per="/name/{name}",...,le="+Inf"} 42
/// http_requests_duration_sum{per="/name/{name}",...} 120.5
/// http_requests_duration_count{per="/name/{name}",...} 42
/// ```
pub fn export_prometheus(registry: &MetricRegistry) -> String {
    let mut output = String::with_capacity(4096);

    for (def, counter) in registry.counters() {
        write_counter(&mut output, &def.name, &def.help, counter.get_all());
    }

    for (def, histogram) in registry.histograms() {
        write_histogram(&mut output, &def.name, &def.help, histogram.get_all());
    }

    output
}

fn write_counter(output: &mut String, name: &str, help: &str, values: Vec<(String, u64)>) {
    if values.is_empty() {
        return;
    }

    let _ = writeln!(output, "# HELP {name} {}", escape_help(help));
    let _ = writeln!(output, "# TYPE {name} counter");

    for (labels, value) in values {
        if labels.is_empty() {
            let _ = writeln!(output, "{name} {value}");
        } else {
            let _ = writeln!(output, "{name}{{{labels}}} {value}");
        }
    }
    let _ = writeln!(output);
}

fn write_histogram(output: &mut String, name: &str, help: &str, data: Vec<HistogramData>) {
    if data.is_empty() {
        return;
    }

    let _ = writeln!(output, "# HELP {name} {}", escape_help(help));
    let _ = writeln!(output, "# TYPE {name} histogram");

    for hist in data {
        let labels = &hist.labels;
        let prefix = if labels.is_empty() {
            String::new()
        } else {
            format!("{labels},")
        };

        for (bound, count) in hist.buckets.iter().zip(&hist.counts) {
            let le = format_le(*bound);
            let _ = writeln!(output, "{name}_bucket{{{prefix}le=\"{le}\"}} {count}");
        }
        let _ = writeln!(output, "{name}_bucket{{{prefix}le=\"+Inf\"}} {}", hist.count);

        if labels.is_empty() {
            let _ = writeln!(output, "{name}_sum {}", hist.sum);
            let _ = writeln!(output, "{name}_count {}", hist.count);
        } else {
            let _ = writeln!(output, "{name}_sum{{{labels}}} {}", hist.sum);
            let _ = writeln!(output, "{name}_count{{{labels}}} {}", hist.count);
        }
    }
    let _ = writeln!(output);
}

/// Format a bucket boundary for Prometheus.
fn format_le(value: f64) -> String {
    if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == value.floor() && value.abs() < 1e10 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Extension trait for MetricRegistry to add prometheus export.
pub trait PrometheusExport {
    /// Export all metrics in Prometheus text format.
    fn export_prometheus(&self) -> String;
}

impl PrometheusExport for MetricRegistry {
    fn export_prometheus(&self) -> String {
        export_prometheus(self)
    }
}
