//! Shim Metrics - operation series for container runtime shims.
//!
//! A runtime shim performs discrete operations against a container runtime
//! (create, start, stop, remove, pull, ...). This crate defines the series
//! those operations are counted and timed on, and installs them into a
//! registry exactly once.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use shim_metrics::{new_shared_registry, MetricsConfig, OperationMetrics, Registrar};
//!
//! let registry = new_shared_registry();
//! let metrics = Arc::new(OperationMetrics::from_config(&MetricsConfig::default())?);
//! let registrar = Registrar::new(registry.clone(), metrics.clone());
//! registrar.register()?;
//!
//! // Time an operation and classify its result
//! let container = metrics.instrument("create_container", || runtime.create(&container_config))?;
//!
//! // Export to Prometheus format
//! let prometheus_text = registry.to_prometheus();
//! ```

mod atomic;
mod text;

pub mod config;
pub mod counter;
pub mod definitions;
pub mod desc;
pub mod elapsed;
pub mod error;
pub mod histogram;
pub mod legacy;
pub mod registrar;
pub mod registry;
pub mod summary;

pub use config::MetricsConfig;
pub use counter::{Counter, CounterVec};
pub use definitions::{OperationMetrics, OperationOutcome, OperationTimer, TimeoutAware};
pub use desc::{MetricKind, SeriesDesc, StabilityLevel};
pub use elapsed::{elapsed_microseconds, elapsed_seconds};
pub use error::{Error, Result};
pub use histogram::{Histogram, HistogramVec, DEFAULT_BUCKETS};
pub use registrar::Registrar;
pub use registry::{new_shared_registry, Collector, Registry, SharedRegistry};
pub use summary::{Summary, SummaryOpts, SummaryVec};
