//! Shim Metrics Benchmark Suite
//!
//! Fixtures shared by the Criterion benchmarks.
//!
//! # Benchmark Categories
//!
//! - **Record**: counter increments, histogram/summary observations, full fan-out
//! - **Export**: Prometheus text rendering at different label cardinalities

use std::sync::Arc;
use std::time::Instant;

use shim_metrics::{
    new_shared_registry, MetricsConfig, OperationMetrics, OperationOutcome, Registrar,
    SharedRegistry,
};

/// Operation types a docker shim reports.
pub const OPERATION_TYPES: [&str; 8] = [
    "create_container",
    "start_container",
    "stop_container",
    "remove_container",
    "list_containers",
    "inspect_container",
    "pull_image",
    "exec_sync",
];

/// A registry with the operation series installed.
pub struct BenchContext {
    pub registry: SharedRegistry,
    pub metrics: Arc<OperationMetrics>,
}

impl BenchContext {
    /// Build and register the default series.
    pub fn new() -> Self {
        let registry = new_shared_registry();
        let metrics = Arc::new(
            OperationMetrics::from_config(&MetricsConfig::default())
                .expect("default config is valid"),
        );
        Registrar::new(Arc::clone(&registry), Arc::clone(&metrics))
            .register()
            .expect("fresh registry has no collisions");
        Self { registry, metrics }
    }

    /// Record `per_label` operations for each of `labels` generated label values.
    pub fn populate(&self, labels: usize, per_label: usize) {
        let start = Instant::now();
        for i in 0..labels {
            let op = format!("{}_{}", OPERATION_TYPES[i % OPERATION_TYPES.len()], i);
            for n in 0..per_label {
                let outcome = match n % 10 {
                    0 => OperationOutcome::Failed,
                    1 => OperationOutcome::TimedOut,
                    _ => OperationOutcome::Success,
                };
                self.metrics.observe(&op, start, outcome);
            }
        }
    }
}

impl Default for BenchContext {
    fn default() -> Self {
        Self::new()
    }
}
