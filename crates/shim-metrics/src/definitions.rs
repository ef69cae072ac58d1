//! Operation series definitions.
//!
//! Eight series describe the operations a runtime shim performs: four current
//! ones (count, errors, timeouts, latency histogram in seconds) and four
//! deprecated mirrors (count, errors, timeouts, latency summary in
//! microseconds). Every event is recorded through [`OperationMetrics`], which
//! fans out to both generations so they stay in step during the deprecation
//! window.

use std::sync::Arc;
use std::time::Instant;

use crate::config::MetricsConfig;
use crate::counter::CounterVec;
use crate::desc::{MetricKind, SeriesDesc, StabilityLevel};
use crate::elapsed::{elapsed_microseconds_between, elapsed_seconds_between};
use crate::error::Result;
use crate::histogram::HistogramVec;
use crate::registry::Collector;
use crate::summary::SummaryVec;

/// Key of the operation counter.
pub const OPERATIONS_KEY: &str = "operations_total";
/// Key of the operation latency histogram.
pub const OPERATIONS_LATENCY_KEY: &str = "operations_duration_seconds";
/// Key of the operation error counter.
pub const OPERATIONS_ERRORS_KEY: &str = "operations_errors_total";
/// Key of the operation timeout counter.
pub const OPERATIONS_TIMEOUT_KEY: &str = "operations_timeout_total";

/// Deprecated key of the operation counter.
pub const DEPRECATED_OPERATIONS_KEY: &str = "operations";
/// Deprecated key of the operation latency summary.
pub const DEPRECATED_OPERATIONS_LATENCY_KEY: &str = "operations_latency_microseconds";
/// Deprecated key of the operation error counter.
pub const DEPRECATED_OPERATIONS_ERRORS_KEY: &str = "operations_errors";
/// Deprecated key of the operation timeout counter.
pub const DEPRECATED_OPERATIONS_TIMEOUT_KEY: &str = "operations_timeout";

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Completed successfully.
    Success,
    /// Failed.
    Failed,
    /// Failed because it exceeded its time budget.
    TimedOut,
}

impl OperationOutcome {
    /// Classify a result.
    pub fn from_result<T, E: TimeoutAware>(result: &std::result::Result<T, E>) -> Self {
        match result {
            Ok(_) => OperationOutcome::Success,
            Err(e) if e.is_timeout() => OperationOutcome::TimedOut,
            Err(_) => OperationOutcome::Failed,
        }
    }

    /// Whether the operation failed, timeouts included.
    pub fn is_error(&self) -> bool {
        !matches!(self, OperationOutcome::Success)
    }
}

/// Errors that can tell a timeout apart from other failures.
pub trait TimeoutAware {
    /// Whether the error is a timeout.
    fn is_timeout(&self) -> bool;
}

impl TimeoutAware for std::io::Error {
    fn is_timeout(&self) -> bool {
        self.kind() == std::io::ErrorKind::TimedOut
    }
}

/// The eight operation series.
#[derive(Debug)]
pub struct OperationMetrics {
    operations: Arc<CounterVec>,
    errors: Arc<CounterVec>,
    timeouts: Arc<CounterVec>,
    latency: Arc<HistogramVec>,
    deprecated_operations: Arc<CounterVec>,
    deprecated_errors: Arc<CounterVec>,
    deprecated_timeouts: Arc<CounterVec>,
    deprecated_latency: Arc<SummaryVec>,
}

impl OperationMetrics {
    /// Build the series described by `config`.
    pub fn from_config(config: &MetricsConfig) -> Result<Self> {
        config.validate()?;

        let runtime = config.runtime.as_str();
        let desc = |key: &str, help: String, kind: MetricKind| {
            SeriesDesc::new(
                config.subsystem.as_str(),
                format!("{}_{}", runtime, key),
                help,
                kind,
            )
            .with_label(config.label.as_str())
            .with_stability(StabilityLevel::Alpha)
        };
        let deprecated = |key: &str, help: String, kind: MetricKind| {
            desc(key, help, kind).deprecated_since(config.deprecated_version.as_str())
        };

        Ok(Self {
            operations: Arc::new(CounterVec::new(desc(
                OPERATIONS_KEY,
                format!("Cumulative number of {} operations by operation type.", runtime),
                MetricKind::Counter,
            ))?),
            errors: Arc::new(CounterVec::new(desc(
                OPERATIONS_ERRORS_KEY,
                format!("Cumulative number of {} operation errors by operation type.", runtime),
                MetricKind::Counter,
            ))?),
            timeouts: Arc::new(CounterVec::new(desc(
                OPERATIONS_TIMEOUT_KEY,
                format!("Cumulative number of {} operation timeout by operation type.", runtime),
                MetricKind::Counter,
            ))?),
            latency: Arc::new(HistogramVec::new(
                desc(
                    OPERATIONS_LATENCY_KEY,
                    format!(
                        "Latency in seconds of {} operations. Broken down by operation type.",
                        runtime
                    ),
                    MetricKind::Histogram,
                ),
                &config.latency_buckets,
            )?),
            deprecated_operations: Arc::new(CounterVec::new(deprecated(
                DEPRECATED_OPERATIONS_KEY,
                format!("Cumulative number of {} operations by operation type.", runtime),
                MetricKind::Counter,
            ))?),
            deprecated_errors: Arc::new(CounterVec::new(deprecated(
                DEPRECATED_OPERATIONS_ERRORS_KEY,
                format!("Cumulative number of {} operation errors by operation type.", runtime),
                MetricKind::Counter,
            ))?),
            deprecated_timeouts: Arc::new(CounterVec::new(deprecated(
                DEPRECATED_OPERATIONS_TIMEOUT_KEY,
                format!("Cumulative number of {} operation timeout by operation type.", runtime),
                MetricKind::Counter,
            ))?),
            deprecated_latency: Arc::new(SummaryVec::new(
                deprecated(
                    DEPRECATED_OPERATIONS_LATENCY_KEY,
                    format!(
                        "Latency in microseconds of {} operations. Broken down by operation type.",
                        runtime
                    ),
                    MetricKind::Summary,
                ),
                config.summary_opts(),
            )?),
        })
    }

    /// Completed operations, successful or not.
    pub fn operations(&self) -> &Arc<CounterVec> {
        &self.operations
    }

    /// Failed operations, timeouts included.
    pub fn errors(&self) -> &Arc<CounterVec> {
        &self.errors
    }

    /// Operations that exceeded their time budget.
    pub fn timeouts(&self) -> &Arc<CounterVec> {
        &self.timeouts
    }

    /// Operation latency in seconds.
    pub fn latency(&self) -> &Arc<HistogramVec> {
        &self.latency
    }

    /// Deprecated mirror of [`operations`](Self::operations).
    pub fn deprecated_operations(&self) -> &Arc<CounterVec> {
        &self.deprecated_operations
    }

    /// Deprecated mirror of [`errors`](Self::errors).
    pub fn deprecated_errors(&self) -> &Arc<CounterVec> {
        &self.deprecated_errors
    }

    /// Deprecated mirror of [`timeouts`](Self::timeouts).
    pub fn deprecated_timeouts(&self) -> &Arc<CounterVec> {
        &self.deprecated_timeouts
    }

    /// Deprecated operation latency in microseconds.
    pub fn deprecated_latency(&self) -> &Arc<SummaryVec> {
        &self.deprecated_latency
    }

    /// All eight series in installation order.
    pub fn collectors(&self) -> Vec<Arc<dyn Collector>> {
        let collectors: [Arc<dyn Collector>; 8] = [
            self.latency.clone(),
            self.operations.clone(),
            self.errors.clone(),
            self.timeouts.clone(),
            self.deprecated_latency.clone(),
            self.deprecated_operations.clone(),
            self.deprecated_errors.clone(),
            self.deprecated_timeouts.clone(),
        ];
        Vec::from(collectors)
    }

    /// Count a completed operation and record its latency on both
    /// generations of series.
    pub fn record_operation(&self, operation_type: &str, start: Instant) {
        let now = Instant::now();
        let labels = [operation_type];

        self.operations.inc(&labels);
        self.deprecated_operations.inc(&labels);
        self.latency.observe(&labels, elapsed_seconds_between(start, now));
        self.deprecated_latency
            .observe(&labels, elapsed_microseconds_between(start, now) as f64);
    }

    /// Count a failure. Timeouts are counted as errors too.
    pub fn record_error(&self, operation_type: &str, outcome: OperationOutcome) {
        let labels = [operation_type];
        match outcome {
            OperationOutcome::Success => return,
            OperationOutcome::TimedOut => {
                self.timeouts.inc(&labels);
                self.deprecated_timeouts.inc(&labels);
            }
            OperationOutcome::Failed => {}
        }
        self.errors.inc(&labels);
        self.deprecated_errors.inc(&labels);
    }

    /// Record a completed operation and its outcome.
    pub fn observe(&self, operation_type: &str, start: Instant, outcome: OperationOutcome) {
        self.record_operation(operation_type, start);
        self.record_error(operation_type, outcome);
    }

    /// Start timing an operation.
    pub fn start<'a>(&'a self, operation_type: &'a str) -> OperationTimer<'a> {
        OperationTimer {
            metrics: self,
            operation_type,
            start: Instant::now(),
        }
    }

    /// Run `f` as an operation, recording its latency and outcome.
    pub fn instrument<T, E, F>(&self, operation_type: &str, f: F) -> std::result::Result<T, E>
    where
        E: TimeoutAware,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let timer = self.start(operation_type);
        let result = f();
        timer.finish_result(&result);
        result
    }
}

/// An operation in flight. Nothing is recorded unless it is finished.
#[must_use = "an operation is only recorded when the timer is finished"]
#[derive(Debug)]
pub struct OperationTimer<'a> {
    metrics: &'a OperationMetrics,
    operation_type: &'a str,
    start: Instant,
}

impl OperationTimer<'_> {
    /// When the operation started.
    pub fn started_at(&self) -> Instant {
        self.start
    }

    /// Record the operation with the given outcome.
    pub fn finish(self, outcome: OperationOutcome) {
        self.metrics.observe(self.operation_type, self.start, outcome);
    }

    /// Record the operation, classifying its result.
    pub fn finish_result<T, E: TimeoutAware>(self, result: &std::result::Result<T, E>) {
        self.finish(OperationOutcome::from_result(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    fn metrics() -> OperationMetrics {
        OperationMetrics::from_config(&MetricsConfig::default()).unwrap()
    }

    #[test]
    fn test_default_names() {
        let m = metrics();
        let names: Vec<String> = m
            .collectors()
            .iter()
            .map(|c| c.desc().fq_name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "kubelet_docker_operations_duration_seconds",
                "kubelet_docker_operations_total",
                "kubelet_docker_operations_errors_total",
                "kubelet_docker_operations_timeout_total",
                "kubelet_docker_operations_latency_microseconds",
                "kubelet_docker_operations",
                "kubelet_docker_operations_errors",
                "kubelet_docker_operations_timeout",
            ]
        );
    }

    #[test]
    fn test_deprecation_markers() {
        let m = metrics();
        for collector in m.collectors() {
            let desc = collector.desc();
            assert_eq!(desc.label_names(), ["operation_type".to_string()]);
            assert_eq!(desc.stability(), StabilityLevel::Alpha);
        }
        assert_eq!(m.deprecated_latency().desc().deprecated_version(), Some("1.14.0"));
        assert_eq!(m.deprecated_latency().desc().kind(), MetricKind::Summary);
        assert_eq!(m.deprecated_operations().desc().deprecated_version(), Some("1.14.0"));
        assert_eq!(m.latency().desc().deprecated_version(), None);
        assert_eq!(m.latency().desc().kind(), MetricKind::Histogram);
    }

    #[test]
    fn test_record_operation_fans_out() {
        let m = metrics();
        let start = Instant::now()
            .checked_sub(Duration::from_millis(20))
            .unwrap_or_else(Instant::now);

        m.record_operation("create_container", start);

        assert_eq!(m.operations().get(&["create_container"]), 1);
        assert_eq!(m.deprecated_operations().get(&["create_container"]), 1);

        let hist = m.latency().get(&["create_container"]).unwrap();
        let summary = m.deprecated_latency().get(&["create_container"]).unwrap();
        assert_eq!(hist.count(), 1);
        assert_eq!(summary.count(), 1);
        // Same instant, different units.
        assert!((summary.sum() / 1_000_000.0 - hist.sum()).abs() < 1e-6);
    }

    #[test]
    fn test_record_error() {
        let m = metrics();
        m.record_error("stop_container", OperationOutcome::Success);
        m.record_error("stop_container", OperationOutcome::Failed);
        m.record_error("stop_container", OperationOutcome::TimedOut);

        assert_eq!(m.errors().get(&["stop_container"]), 2);
        assert_eq!(m.deprecated_errors().get(&["stop_container"]), 2);
        assert_eq!(m.timeouts().get(&["stop_container"]), 1);
        assert_eq!(m.deprecated_timeouts().get(&["stop_container"]), 1);
        assert_eq!(m.operations().get(&["stop_container"]), 0);
    }

    #[test]
    fn test_instrument() {
        let m = metrics();

        let ok: io::Result<u32> = m.instrument("pull_image", || Ok(7));
        assert_eq!(ok.unwrap(), 7);

        let timed_out: io::Result<()> = m.instrument("pull_image", || {
            Err(io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded"))
        });
        assert!(timed_out.is_err());

        let failed: io::Result<()> =
            m.instrument("pull_image", || Err(io::Error::other("no such image")));
        assert!(failed.is_err());

        assert_eq!(m.operations().get(&["pull_image"]), 3);
        assert_eq!(m.errors().get(&["pull_image"]), 2);
        assert_eq!(m.timeouts().get(&["pull_image"]), 1);
        assert_eq!(m.latency().get(&["pull_image"]).map(|h| h.count()), Some(3));
    }

    #[test]
    fn test_timer_finish() {
        let m = metrics();
        let timer = m.start("remove_container");
        assert!(timer.started_at() <= Instant::now());
        timer.finish(OperationOutcome::Failed);

        assert_eq!(m.operations().get(&["remove_container"]), 1);
        assert_eq!(m.errors().get(&["remove_container"]), 1);
        assert_eq!(m.timeouts().get(&["remove_container"]), 0);
    }

    #[test]
    fn test_custom_config() {
        let config = MetricsConfig::new()
            .with_subsystem("node")
            .with_runtime("containerd")
            .with_deprecated_version("2.0.0");
        let m = OperationMetrics::from_config(&config).unwrap();

        assert_eq!(m.operations().desc().fq_name(), "node_containerd_operations_total");
        assert_eq!(m.deprecated_errors().desc().deprecated_version(), Some("2.0.0"));
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: io::Result<()> = Ok(());
        let timeout: io::Result<()> = Err(io::ErrorKind::TimedOut.into());
        let other: io::Result<()> = Err(io::ErrorKind::NotFound.into());

        assert_eq!(OperationOutcome::from_result(&ok), OperationOutcome::Success);
        assert_eq!(OperationOutcome::from_result(&timeout), OperationOutcome::TimedOut);
        assert_eq!(OperationOutcome::from_result(&other), OperationOutcome::Failed);
        assert!(OperationOutcome::TimedOut.is_error());
        assert!(!OperationOutcome::Success.is_error());
    }
}
