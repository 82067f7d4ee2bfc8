//! Parsing utilities for environment configuration values

/// Parse a comma-separated list of bucket boundaries (e.g., "5,10,25.5,100").
///
/// Whitespace around entries is ignored, empty entries are skipped.
/// Returns `None` if any entry is not a number.
pub fn parse_buckets(s: &str) -> Option<Vec<f64>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().ok())
        .collect()
}

/// Parse a boolean flag.
///
/// # Supported formats
/// - `"true"`, `"1"`, `"yes"`, `"on"` - true
/// - `"false"`, `"0"`, `"no"`, `"off"` - false
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
