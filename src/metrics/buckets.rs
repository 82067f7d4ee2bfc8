//! Latency bucket boundaries (milliseconds)
//!
//! Boundaries grow geometrically so low latencies get fine resolution while a
//! few wide buckets cover slow requests.

/// Final bucket: one hour, in milliseconds.
const LAST_BUCKET_MS: f64 = 3_600_000.0;

/// Default request-duration buckets in milliseconds.
///
/// 30 geometric steps starting at 0.25 ms with a growth rate of 1.5, each
/// rounded down to a quarter millisecond, followed by a one-hour bucket.
pub fn default_duration_buckets() -> Vec<f64> {
    latency_bins(0.25, 1.5, 31)
}

/// Build `limit` bucket boundaries: `limit - 1` geometric steps plus a final
/// one-hour bucket.
///
/// Each boundary is the previous one plus `step_start * rate^(i - 1)`, floored
/// to a multiple of 0.25.
pub fn latency_bins(step_start: f64, rate: f64, limit: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(limit);
    let mut last = 0.0_f64;
    for i in 1..limit {
        let step = step_start * rate.powi(i as i32 - 1);
        last = ((last + step) * 4.0).floor() / 4.0;
        out.push(last);
    }
    out.push(LAST_BUCKET_MS);
    out
}
