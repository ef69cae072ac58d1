//! Exactly-once installation of the operation series.

use std::sync::{Arc, OnceLock};

use crate::definitions::OperationMetrics;
use crate::error::Result;
use crate::registry::{Collector, SharedRegistry};

/// Installs the operation series into a registry, once.
///
/// The first call to [`register`](Self::register) performs the installation.
/// Callers arriving while it runs block until it completes; every later call
/// returns the cached outcome. A failed installation is never retried.
#[derive(Debug)]
pub struct Registrar {
    registry: SharedRegistry,
    metrics: Arc<OperationMetrics>,
    outcome: OnceLock<Result<()>>,
}

impl Registrar {
    /// Create a registrar for `metrics` targeting `registry`.
    pub fn new(registry: SharedRegistry, metrics: Arc<OperationMetrics>) -> Self {
        Self {
            registry,
            metrics,
            outcome: OnceLock::new(),
        }
    }

    /// Install all series.
    ///
    /// An error means a series name collided with one already installed.
    /// That is a configuration error; treat it as fatal. The names are
    /// checked before any series is inserted, so a collision installs none
    /// of the eight.
    pub fn register(&self) -> Result<()> {
        self.outcome
            .get_or_init(|| install(&self.registry, &self.metrics))
            .clone()
    }

    /// Whether installation has completed successfully.
    pub fn is_registered(&self) -> bool {
        matches!(self.outcome.get(), Some(Ok(())))
    }

    /// The target registry.
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// The series being installed.
    pub fn metrics(&self) -> &Arc<OperationMetrics> {
        &self.metrics
    }
}

fn install(registry: &SharedRegistry, metrics: &OperationMetrics) -> Result<()> {
    let collectors = metrics.collectors();
    if let Err(e) = registry.register_all(&collectors) {
        tracing::error!(error = %e, "failed to register operation metrics");
        return Err(e);
    }
    tracing::info!(
        series = collectors.len(),
        subsystem = %metrics.operations().desc().subsystem(),
        "registered operation metrics"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use crate::error::Error;
    use crate::registry::new_shared_registry;

    fn operation_metrics() -> Arc<OperationMetrics> {
        Arc::new(OperationMetrics::from_config(&MetricsConfig::default()).unwrap())
    }

    #[test]
    fn test_register_once() {
        let registrar = Registrar::new(new_shared_registry(), operation_metrics());
        assert!(!registrar.is_registered());

        registrar.register().unwrap();
        registrar.register().unwrap();

        assert!(registrar.is_registered());
        assert_eq!(registrar.registry().len(), 8);
    }

    #[test]
    fn test_two_registrars_same_metrics() {
        let registry = new_shared_registry();
        let metrics = operation_metrics();

        Registrar::new(registry.clone(), metrics.clone()).register().unwrap();
        Registrar::new(registry.clone(), metrics).register().unwrap();

        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_collision_is_cached() {
        let registry = new_shared_registry();
        Registrar::new(registry.clone(), operation_metrics())
            .register()
            .unwrap();

        let second = Registrar::new(registry.clone(), operation_metrics());
        let err = second.register().unwrap_err();
        assert_eq!(
            err,
            Error::AlreadyRegistered("kubelet_docker_operations_duration_seconds".to_string())
        );
        assert_eq!(second.register().unwrap_err(), err);
        assert!(!second.is_registered());
    }

    #[test]
    fn test_collision_on_late_series_installs_nothing() {
        let registry = new_shared_registry();
        // Occupies the name of the fifth series in installation order.
        let squatter = OperationMetrics::from_config(&MetricsConfig::default()).unwrap();
        registry
            .register(squatter.deprecated_latency().clone())
            .unwrap();

        let registrar = Registrar::new(registry.clone(), operation_metrics());
        let err = registrar.register().unwrap_err();

        assert_eq!(
            err,
            Error::AlreadyRegistered("kubelet_docker_operations_latency_microseconds".to_string())
        );
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains("kubelet_docker_operations_duration_seconds"));
    }
}
