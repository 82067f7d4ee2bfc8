//! Core metric types: Counter and Histogram
//!
//! Thread-safe metric primitives keyed by a rendered label string
//! (`key1="value1",key2="value2"`). A series is created lazily on its first
//! observation and lives as long as the owning registry.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Series keyed by rendered label string, created on first use.
#[derive(Debug)]
struct SeriesMap<T> {
    series: RwLock<HashMap<String, T>>,
}

impl<T> Default for SeriesMap<T> {
    fn default() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> SeriesMap<T> {
    /// Run `f` on the series for `labels`, creating it with `init` if absent.
    ///
    /// Existing series only take the read lock.
    fn update<R>(&self, labels: &str, init: impl FnOnce() -> T, f: impl FnOnce(&T) -> R) -> R {
        if let Some(existing) = self.series.read().get(labels) {
            return f(existing);
        }

        let mut series = self.series.write();
        f(series.entry(labels.to_string()).or_insert_with(init))
    }

    fn read<R>(&self, labels: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.series.read().get(labels).map(f)
    }

    /// Snapshot every series, sorted by label string.
    fn snapshot<R>(&self, f: impl Fn(&str, &T) -> R) -> Vec<(String, R)> {
        let mut all: Vec<(String, R)> = self
            .series
            .read()
            .iter()
            .map(|(labels, value)| (labels.clone(), f(labels, value)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

/// Thread-safe labeled counter.
///
/// Counters only go up; one value per label combination.
#[derive(Debug, Default)]
pub struct LabeledCounter {
    values: SeriesMap<AtomicU64>,
}

impl LabeledCounter {
    /// Create a new labeled counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1 for the given label combination.
    pub fn inc(&self, labels: &str) {
        self.add(labels, 1);
    }

    /// Increment by `value` for the given label combination.
    pub fn add(&self, labels: &str, value: u64) {
        self.values.update(labels, AtomicU64::default, |counter| {
            counter.fetch_add(value, Ordering::Relaxed)
        });
    }

    /// Current value for the given label combination; 0 if never recorded.
    pub fn get(&self, labels: &str) -> u64 {
        self.values
            .read(labels, |counter| counter.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum of every series.
    pub fn total(&self) -> u64 {
        self.get_all().iter().map(|(_, value)| value).sum()
    }

    /// All label/value pairs, sorted by label string.
    pub fn get_all(&self) -> Vec<(String, u64)> {
        self.values
            .snapshot(|_, counter| counter.load(Ordering::Relaxed))
    }
}

/// Per-series histogram state. Bucket counts are cumulative.
#[derive(Debug)]
struct HistogramSeries {
    counts: Vec<AtomicU64>,
    sum_bits: AtomicU64,
    count: AtomicU64,
}

impl HistogramSeries {
    fn new(buckets: usize) -> Self {
        Self {
            counts: (0..buckets).map(|_| AtomicU64::new(0)).collect(),
            sum_bits: AtomicU64::new(0f64.to_bits()),
            count: AtomicU64::new(0),
        }
    }

    // `count` doubles as the `+Inf` bucket, so it is bumped before any finite
    // bucket. Release on the buckets pairs with Acquire in `Histogram::get_all`.
    fn observe(&self, bounds: &[f64], value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);

        for (count, &bound) in self.counts.iter().zip(bounds) {
            if value <= bound {
                count.fetch_add(1, Ordering::Release);
            }
        }

        let mut current = self.sum_bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self.sum_bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Thread-safe histogram with fixed bucket boundaries.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<f64>,
    series: SeriesMap<HistogramSeries>,
}

impl Histogram {
    /// Create a histogram with the given upper bounds.
    ///
    /// Bounds should be sorted in ascending order; the implicit `+Inf`
    /// bucket is not part of the list.
    pub fn new(buckets: &[f64]) -> Self {
        Self {
            buckets: buckets.to_vec(),
            series: SeriesMap::default(),
        }
    }

    /// Upper bounds of the finite buckets.
    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    /// Observe a value for the given label combination.
    pub fn observe(&self, labels: &str, value: f64) {
        self.series.update(
            labels,
            || HistogramSeries::new(self.buckets.len()),
            |series| series.observe(&self.buckets, value),
        );
    }

    /// Number of observations recorded for a label combination.
    pub fn count(&self, labels: &str) -> u64 {
        self.series
            .read(labels, |series| series.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Histogram data for export, sorted by label string.
    pub fn get_all(&self) -> Vec<HistogramData> {
        self.series
            .snapshot(|_, series| {
                (
                    series.counts.iter().map(|c| c.load(Ordering::Acquire)).collect::<Vec<u64>>(),
                    f64::from_bits(series.sum_bits.load(Ordering::Relaxed)),
                    series.count.load(Ordering::Relaxed),
                )
            })
            .into_iter()
            .map(|(labels, (counts, sum, count))| HistogramData {
                labels,
                buckets: self.buckets.clone(),
                counts,
                sum,
                count,
            })
            .collect()
    }
}

/// Histogram data for a single label combination.
#[derive(Debug, Clone)]
pub struct HistogramData {
    /// Label string (e.g., `method="GET",per="/api"`)
    pub labels: String,
    /// Bucket boundaries
    pub buckets: Vec<f64>,
    /// Cumulative counts for each bucket
    pub counts: Vec<u64>,
    /// Sum of all observed values
    pub sum: f64,
    /// Total number of observations
    pub count: u64,
}
