//! Fixed-bucket histogram for latency tracking.
//!
//! Bucket boundaries are upper bounds in seconds. Every histogram also has an
//! implicit `+Inf` bucket, so no observation is ever dropped or clamped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::atomic::AtomicF64;
use crate::desc::{label_key, LabelValues, MetricKind, SeriesDesc};
use crate::error::{Error, Result};
use crate::registry::Collector;
use crate::text;

/// Default bucket boundaries in seconds.
///
/// Buckets: 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Check that bucket boundaries are non-empty, finite and strictly increasing.
pub fn validate_buckets(buckets: &[f64]) -> Result<()> {
    if buckets.is_empty() {
        return Err(Error::InvalidDescriptor(
            "histogram needs at least one bucket".to_string(),
        ));
    }
    if buckets.iter().any(|b| !b.is_finite()) {
        return Err(Error::InvalidDescriptor(
            "histogram buckets must be finite".to_string(),
        ));
    }
    if buckets.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(Error::InvalidDescriptor(
            "histogram buckets must be strictly increasing".to_string(),
        ));
    }
    Ok(())
}

/// Fixed-bucket histogram.
///
/// All operations are lock-free using atomic operations.
#[derive(Debug)]
pub struct Histogram {
    /// Bucket upper bounds.
    buckets: Arc<[f64]>,
    /// Non-cumulative counts per bucket; the extra last slot is `+Inf`.
    counts: Vec<AtomicU64>,
    /// Sum of all observed values.
    sum: AtomicF64,
    /// Total count of observations.
    count: AtomicU64,
}

impl Histogram {
    /// Create a histogram with the given bucket boundaries.
    pub fn new(buckets: &[f64]) -> Result<Self> {
        validate_buckets(buckets)?;
        Ok(Self::with_checked_buckets(Arc::from(buckets)))
    }

    /// Create a histogram with [`DEFAULT_BUCKETS`].
    pub fn seconds() -> Self {
        Self::with_checked_buckets(Arc::from(&DEFAULT_BUCKETS[..]))
    }

    fn with_checked_buckets(buckets: Arc<[f64]>) -> Self {
        let counts = (0..=buckets.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: AtomicF64::default(),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value.
    ///
    /// Negative values land in the first bucket and are summed as-is.
    pub fn observe(&self, value: f64) {
        self.sum.add(value);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = self
            .buckets
            .iter()
            .position(|&boundary| value <= boundary)
            .unwrap_or(self.buckets.len());
        self.counts[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total count of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get the sum of all observed values.
    pub fn sum(&self) -> f64 {
        self.sum.get()
    }

    /// Get average value.
    pub fn avg(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        self.sum() / count as f64
    }

    /// Bucket boundaries, without the implicit `+Inf`.
    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    /// Get approximate percentile (e.g., 0.50 for P50, 0.99 for P99).
    ///
    /// Returns the upper boundary of the bucket containing the target
    /// percentile, or `+Inf` when it falls past the last boundary.
    pub fn percentile(&self, p: f64) -> f64 {
        let total = self.count();
        if total == 0 {
            return 0.0;
        }

        let target = ((total as f64 * p).ceil() as u64).max(1);
        let mut cumulative = 0u64;

        for (i, count) in self.counts.iter().enumerate() {
            cumulative += count.load(Ordering::Relaxed);
            if cumulative >= target {
                return self.buckets.get(i).copied().unwrap_or(f64::INFINITY);
            }
        }

        f64::INFINITY
    }

    /// Get P50 (median) latency.
    pub fn p50(&self) -> f64 {
        self.percentile(0.50)
    }

    /// Get P99 latency.
    pub fn p99(&self) -> f64 {
        self.percentile(0.99)
    }

    /// Cumulative counts per bucket, ending with `(+Inf, count)`.
    pub fn snapshot(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        self.buckets
            .iter()
            .copied()
            .chain(std::iter::once(f64::INFINITY))
            .zip(self.counts.iter())
            .map(|(boundary, count)| {
                cumulative += count.load(Ordering::Relaxed);
                (boundary, cumulative)
            })
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::seconds()
    }
}

/// A histogram partitioned by label values.
#[derive(Debug)]
pub struct HistogramVec {
    desc: SeriesDesc,
    buckets: Arc<[f64]>,
    children: DashMap<LabelValues, Arc<Histogram>>,
}

impl HistogramVec {
    /// Create a histogram vector from a histogram descriptor.
    pub fn new(desc: SeriesDesc, buckets: &[f64]) -> Result<Self> {
        if desc.kind() != MetricKind::Histogram {
            return Err(Error::InvalidDescriptor(format!(
                "{} is a {}, not a histogram",
                desc.fq_name(),
                desc.kind()
            )));
        }
        desc.validate()?;
        validate_buckets(buckets)?;
        Ok(Self {
            desc,
            buckets: Arc::from(buckets),
            children: DashMap::new(),
        })
    }

    /// Histogram for the given label values, created if missing.
    pub fn with_label_values(&self, values: &[&str]) -> Arc<Histogram> {
        let key = label_key(&self.desc, values);
        let child = self
            .children
            .entry(key)
            .or_insert_with(|| Arc::new(Histogram::with_checked_buckets(Arc::clone(&self.buckets))));
        Arc::clone(child.value())
    }

    /// Record a value for the given label values.
    pub fn observe(&self, values: &[&str], value: f64) {
        self.with_label_values(values).observe(value);
    }

    /// Histogram for the given label values, if any observation was made.
    pub fn get(&self, values: &[&str]) -> Option<Arc<Histogram>> {
        let key = label_key(&self.desc, values);
        self.children.get(&key).map(|h| Arc::clone(h.value()))
    }

    /// Bucket boundaries shared by all children.
    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    fn sorted_children(&self) -> Vec<(LabelValues, Arc<Histogram>)> {
        let mut children: Vec<_> = self
            .children
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        children
    }
}

impl Collector for HistogramVec {
    fn desc(&self) -> &SeriesDesc {
        &self.desc
    }

    fn encode_text(&self, out: &mut String) {
        text::write_header(out, &self.desc);
        let name = self.desc.fq_name();
        let labels = self.desc.label_names();

        for (values, hist) in self.sorted_children() {
            let snapshot = hist.snapshot();
            // _count must equal the +Inf bucket.
            let count = snapshot.last().map(|&(_, c)| c).unwrap_or(0);
            for (boundary, cumulative) in snapshot {
                let le = text::format_value(boundary);
                text::write_sample(
                    out,
                    name,
                    "_bucket",
                    labels,
                    &values,
                    Some(("le", &le)),
                    cumulative as f64,
                );
            }
            text::write_sample(out, name, "_sum", labels, &values, None, hist.sum());
            text::write_sample(out, name, "_count", labels, &values, None, count as f64);
        }
    }
}
