//! Monotonically increasing counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::desc::{label_key, LabelValues, MetricKind, SeriesDesc};
use crate::error::{Error, Result};
use crate::registry::Collector;
use crate::text;

/// A single counter value.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by `n`.
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A counter partitioned by label values.
///
/// Children are created on first use; label values are taken verbatim.
#[derive(Debug)]
pub struct CounterVec {
    desc: SeriesDesc,
    children: DashMap<LabelValues, Arc<Counter>>,
}

impl CounterVec {
    /// Create a counter vector from a counter descriptor.
    pub fn new(desc: SeriesDesc) -> Result<Self> {
        if desc.kind() != MetricKind::Counter {
            return Err(Error::InvalidDescriptor(format!(
                "{} is a {}, not a counter",
                desc.fq_name(),
                desc.kind()
            )));
        }
        desc.validate()?;
        Ok(Self {
            desc,
            children: DashMap::new(),
        })
    }

    /// Counter for the given label values, created if missing.
    pub fn with_label_values(&self, values: &[&str]) -> Arc<Counter> {
        let key = label_key(&self.desc, values);
        Arc::clone(self.children.entry(key).or_default().value())
    }

    /// Increment the counter for the given label values.
    pub fn inc(&self, values: &[&str]) {
        self.with_label_values(values).inc();
    }

    /// Current value for the given label values; zero if never incremented.
    pub fn get(&self, values: &[&str]) -> u64 {
        let key = label_key(&self.desc, values);
        self.children.get(&key).map(|c| c.get()).unwrap_or(0)
    }

    /// Number of distinct label sets seen so far.
    pub fn label_sets(&self) -> usize {
        self.children.len()
    }

    fn sorted_children(&self) -> Vec<(LabelValues, Arc<Counter>)> {
        let mut children: Vec<_> = self
            .children
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        children
    }
}

impl Collector for CounterVec {
    fn desc(&self) -> &SeriesDesc {
        &self.desc
    }

    fn encode_text(&self, out: &mut String) {
        text::write_header(out, &self.desc);
        for (values, counter) in self.sorted_children() {
            text::write_sample(
                out,
                self.desc.fq_name(),
                "",
                self.desc.label_names(),
                &values,
                None,
                counter.get() as f64,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops() -> CounterVec {
        CounterVec::new(
            SeriesDesc::new("kubelet", "ops_total", "Operations.", MetricKind::Counter)
                .with_label("operation_type"),
        )
        .unwrap()
    }

    #[test]
    fn test_counter_inc() {
        let counter = Counter::new();
        counter.inc();
        counter.inc_by(4);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn test_counter_vec_labels() {
        let vec = ops();
        vec.inc(&["create"]);
        vec.inc(&["create"]);
        vec.inc(&["remove"]);

        assert_eq!(vec.get(&["create"]), 2);
        assert_eq!(vec.get(&["remove"]), 1);
        assert_eq!(vec.get(&["stop"]), 0);
        assert_eq!(vec.label_sets(), 2);
    }

    #[test]
    fn test_counter_vec_shares_child() {
        let vec = ops();
        let a = vec.with_label_values(&["start"]);
        let b = vec.with_label_values(&["start"]);
        a.inc();
        b.inc();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(vec.get(&["start"]), 2);
    }

    #[test]
    fn test_counter_vec_rejects_wrong_kind() {
        let desc = SeriesDesc::new("kubelet", "lat", "Latency.", MetricKind::Histogram);
        assert!(matches!(CounterVec::new(desc), Err(Error::InvalidDescriptor(_))));
    }

    #[test]
    fn test_counter_vec_encode() {
        let vec = ops();
        vec.inc(&["remove"]);
        vec.inc(&["create"]);

        let mut out = String::new();
        vec.encode_text(&mut out);
        assert_eq!(
            out,
            "# HELP kubelet_ops_total [ALPHA] Operations.\n\
             # TYPE kubelet_ops_total counter\n\
             kubelet_ops_total{operation_type=\"create\"} 1\n\
             kubelet_ops_total{operation_type=\"remove\"} 1\n"
        );
    }
}
