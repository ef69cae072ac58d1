//! Quantile-estimating summary.
//!
//! Quantiles are computed over a sliding window of recent observations,
//! bounded both by age and by sample count. Count and sum cover every
//! observation ever made.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::atomic::AtomicF64;
use crate::desc::{label_key, LabelValues, MetricKind, SeriesDesc};
use crate::error::{Error, Result};
use crate::registry::Collector;
use crate::text;

/// Default quantile objectives.
pub const DEFAULT_OBJECTIVES: [f64; 3] = [0.5, 0.9, 0.99];

/// Default maximum age of an observation in the window (10 minutes).
pub const DEFAULT_MAX_AGE_SECS: u64 = 600;

/// Default maximum number of observations kept in the window.
pub const DEFAULT_MAX_SAMPLES: usize = 1024;

/// Summary window and objective settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOpts {
    /// Quantiles to report, each in (0, 1).
    pub objectives: Vec<f64>,
    /// Observations older than this drop out of the window.
    pub max_age: Duration,
    /// Upper bound on observations kept in the window.
    pub max_samples: usize,
}

impl SummaryOpts {
    /// Check objectives and window bounds.
    pub fn validate(&self) -> Result<()> {
        if self.objectives.iter().any(|q| !(*q > 0.0 && *q < 1.0)) {
            return Err(Error::InvalidDescriptor(
                "summary objectives must lie in (0, 1)".to_string(),
            ));
        }
        if self.max_age.is_zero() {
            return Err(Error::InvalidDescriptor(
                "summary max age must be non-zero".to_string(),
            ));
        }
        if self.max_samples == 0 {
            return Err(Error::InvalidDescriptor(
                "summary window must hold at least one sample".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SummaryOpts {
    fn default() -> Self {
        Self {
            objectives: DEFAULT_OBJECTIVES.to_vec(),
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECS),
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

/// A single summary.
#[derive(Debug)]
pub struct Summary {
    opts: Arc<SummaryOpts>,
    window: Mutex<VecDeque<(Instant, f64)>>,
    count: AtomicU64,
    sum: AtomicF64,
}

impl Summary {
    /// Create a summary with the given options.
    pub fn new(opts: SummaryOpts) -> Result<Self> {
        opts.validate()?;
        Ok(Self::with_checked_opts(Arc::new(opts)))
    }

    fn with_checked_opts(opts: Arc<SummaryOpts>) -> Self {
        Self {
            opts,
            window: Mutex::new(VecDeque::new()),
            count: AtomicU64::new(0),
            sum: AtomicF64::default(),
        }
    }

    /// Record a value.
    pub fn observe(&self, value: f64) {
        self.observe_at(value, Instant::now());
    }

    fn observe_at(&self, value: f64, now: Instant) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.add(value);

        let mut window = self.window.lock();
        window.push_back((now, value));
        while window.len() > self.opts.max_samples {
            window.pop_front();
        }
        self.prune(&mut window, now);
    }

    fn prune(&self, window: &mut VecDeque<(Instant, f64)>, now: Instant) {
        while let Some(&(at, _)) = window.front() {
            if now.saturating_duration_since(at) > self.opts.max_age {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Total observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of all observations.
    pub fn sum(&self) -> f64 {
        self.sum.get()
    }

    /// Estimate quantile `q` over the current window; NaN when it is empty.
    pub fn quantile(&self, q: f64) -> f64 {
        self.quantiles_of(&[q])[0].1
    }

    /// `(objective, estimate)` for every configured objective.
    pub fn quantiles(&self) -> Vec<(f64, f64)> {
        self.quantiles_of(&self.opts.objectives)
    }

    fn quantiles_of(&self, objectives: &[f64]) -> Vec<(f64, f64)> {
        let mut sorted: Vec<f64> = {
            let mut window = self.window.lock();
            self.prune(&mut window, Instant::now());
            window.iter().map(|&(_, v)| v).collect()
        };
        sorted.sort_by(f64::total_cmp);

        objectives
            .iter()
            .map(|&q| {
                if sorted.is_empty() {
                    return (q, f64::NAN);
                }
                let rank = ((q * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
                (q, sorted[rank - 1])
            })
            .collect()
    }

    /// Number of observations currently in the window.
    pub fn window_len(&self) -> usize {
        self.window.lock().len()
    }
}

/// A summary partitioned by label values.
#[derive(Debug)]
pub struct SummaryVec {
    desc: SeriesDesc,
    opts: Arc<SummaryOpts>,
    children: DashMap<LabelValues, Arc<Summary>>,
}

impl SummaryVec {
    /// Create a summary vector from a summary descriptor.
    pub fn new(desc: SeriesDesc, opts: SummaryOpts) -> Result<Self> {
        if desc.kind() != MetricKind::Summary {
            return Err(Error::InvalidDescriptor(format!(
                "{} is a {}, not a summary",
                desc.fq_name(),
                desc.kind()
            )));
        }
        desc.validate()?;
        opts.validate()?;
        Ok(Self {
            desc,
            opts: Arc::new(opts),
            children: DashMap::new(),
        })
    }

    /// Summary for the given label values, created if missing.
    pub fn with_label_values(&self, values: &[&str]) -> Arc<Summary> {
        let key = label_key(&self.desc, values);
        let child = self
            .children
            .entry(key)
            .or_insert_with(|| Arc::new(Summary::with_checked_opts(Arc::clone(&self.opts))));
        Arc::clone(child.value())
    }

    /// Record a value for the given label values.
    pub fn observe(&self, values: &[&str], value: f64) {
        self.with_label_values(values).observe(value);
    }

    /// Summary for the given label values, if any observation was made.
    pub fn get(&self, values: &[&str]) -> Option<Arc<Summary>> {
        let key = label_key(&self.desc, values);
        self.children.get(&key).map(|s| Arc::clone(s.value()))
    }

    fn sorted_children(&self) -> Vec<(LabelValues, Arc<Summary>)> {
        let mut children: Vec<_> = self
            .children
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        children
    }
}

impl Collector for SummaryVec {
    fn desc(&self) -> &SeriesDesc {
        &self.desc
    }

    fn encode_text(&self, out: &mut String) {
        text::write_header(out, &self.desc);
        let name = self.desc.fq_name();
        let labels = self.desc.label_names();

        for (values, summary) in self.sorted_children() {
            for (q, estimate) in summary.quantiles() {
                let q = text::format_value(q);
                text::write_sample(
                    out,
                    name,
                    "",
                    labels,
                    &values,
                    Some(("quantile", &q)),
                    estimate,
                );
            }
            text::write_sample(out, name, "_sum", labels, &values, None, summary.sum());
            text::write_sample(
                out,
                name,
                "_count",
                labels,
                &values,
                None,
                summary.count() as f64,
            );
        }
    }
}
