//! Process-wide registry for callers that have no registry handle.
//!
//! New code should build its own [`Registry`](crate::Registry) and
//! [`Registrar`] and pass them down.

use std::sync::{Arc, LazyLock};

use crate::config::MetricsConfig;
use crate::definitions::OperationMetrics;
use crate::registrar::Registrar;
use crate::registry::{new_shared_registry, SharedRegistry};

static REGISTRY: LazyLock<SharedRegistry> = LazyLock::new(new_shared_registry);

static REGISTRAR: LazyLock<Registrar> = LazyLock::new(|| {
    let metrics = OperationMetrics::from_config(&MetricsConfig::default())
        .expect("default operation series are valid");
    Registrar::new(Arc::clone(&REGISTRY), Arc::new(metrics))
});

/// The process-wide registry.
pub fn registry() -> &'static SharedRegistry {
    &REGISTRY
}

/// The default operation series.
pub fn metrics() -> &'static OperationMetrics {
    REGISTRAR.metrics()
}

/// Install the default operation series into the process-wide registry.
///
/// Safe to call any number of times from any thread.
///
/// # Panics
///
/// Panics if another series already occupies one of the names.
pub fn register() {
    if let Err(e) = REGISTRAR.register() {
        panic!("failed to register operation metrics: {}", e);
    }
}
