//! RED label tuple
//!
//! Every request observation carries exactly the same six labels, in a fixed
//! order, so the rendered label string is also the series key.

use std::fmt::Write;

/// Label names of both RED metrics, in exposition order.
pub const RED_LABEL_NAMES: [&str; 6] = ["per", "hostname", "domain", "method", "program", "status"];

/// Label values for one request observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RedLabels {
    /// Route group produced by the configured grouper.
    pub per: String,
    /// Host the process runs on.
    pub hostname: String,
    /// Host header of the request (empty when absent).
    pub domain: String,
    /// HTTP method.
    pub method: String,
    /// Program name of the process.
    pub program: String,
    /// Response status code, or `error` when no response was produced.
    pub status: String,
}

impl RedLabels {
    /// Values in the same order as [`RED_LABEL_NAMES`].
    pub fn values(&self) -> [&str; 6] {
        [
            &self.per,
            &self.hostname,
            &self.domain,
            &self.method,
            &self.program,
            &self.status,
        ]
    }

    /// Render as a Prometheus label string, e.g. `per="/",hostname="h",...`.
    pub fn render(&self) -> String {
        render_labels(&RED_LABEL_NAMES, &self.values())
    }
}

/// Render name/value pairs as a Prometheus label string.
///
/// Names and values are paired positionally; extra entries on either side
/// are ignored.
pub fn render_labels(names: &[&str], values: &[&str]) -> String {
    let mut out = String::with_capacity(names.len() * 16);
    for (i, (name, value)) in names.iter().zip(values).enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{name}=\"{}\"", escape_label_value(value));
    }
    out
}

/// Escape a label value for the text exposition format.
pub fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> RedLabels {
        RedLabels {
            per: "/name/{name}".to_string(),
            hostname: "web-1".to_string(),
            domain: "example.com".to_string(),
            method: "GET".to_string(),
            program: "server".to_string(),
            status: "200".to_string(),
        }
    }

    #[test]
    fn test_render_fixed_order() {
        assert_eq!(
            labels().render(),
            "per=\"/name/{name}\",hostname=\"web-1\",domain=\"example.com\",method=\"GET\",program=\"server\",status=\"200\""
        );
    }

    #[test]
    fn test_render_escapes_values() {
        let mut l = labels();
        l.domain = "ev\"il\\host\n".to_string();
        assert!(l.render().contains("domain=\"ev\\\"il\\\\host\\n\""));
    }

    #[test]
    fn test_render_labels_empty() {
        assert_eq!(render_labels(&[], &[]), "");
    }
}
