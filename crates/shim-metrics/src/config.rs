//! Metrics configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::histogram::{self, DEFAULT_BUCKETS};
use crate::summary::{SummaryOpts, DEFAULT_MAX_AGE_SECS, DEFAULT_MAX_SAMPLES, DEFAULT_OBJECTIVES};

/// Default subsystem, kept for backward compatibility of series names.
pub const DEFAULT_SUBSYSTEM: &str = "kubelet";

/// Default runtime prefix of series names.
pub const DEFAULT_RUNTIME: &str = "docker";

/// Default label dimension.
pub const DEFAULT_LABEL: &str = "operation_type";

/// Version since which the deprecated series are deprecated.
pub const DEFAULT_DEPRECATED_VERSION: &str = "1.14.0";

/// Naming and shape of the operation series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Subsystem prefix of every series name.
    pub subsystem: String,

    /// Runtime prefix, e.g. `docker` in `docker_operations_total`.
    pub runtime: String,

    /// Name of the label carrying the operation type.
    pub label: String,

    /// Version advertised on the deprecated series.
    pub deprecated_version: String,

    /// Latency histogram bucket boundaries in seconds.
    pub latency_buckets: Vec<f64>,

    /// Quantiles reported by the deprecated latency summary.
    pub summary_objectives: Vec<f64>,

    /// Age after which an observation leaves the summary window.
    pub summary_max_age_secs: u64,

    /// Maximum observations kept in the summary window.
    pub summary_max_samples: usize,
}

impl MetricsConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subsystem.
    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    /// Set the runtime prefix.
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// Set the deprecated version.
    pub fn with_deprecated_version(mut self, version: impl Into<String>) -> Self {
        self.deprecated_version = version.into();
        self
    }

    /// Set the latency histogram buckets.
    pub fn with_latency_buckets(mut self, buckets: Vec<f64>) -> Self {
        self.latency_buckets = buckets;
        self
    }

    /// Set the summary objectives.
    pub fn with_summary_objectives(mut self, objectives: Vec<f64>) -> Self {
        self.summary_objectives = objectives;
        self
    }

    /// Summary options derived from this configuration.
    pub fn summary_opts(&self) -> SummaryOpts {
        SummaryOpts {
            objectives: self.summary_objectives.clone(),
            max_age: Duration::from_secs(self.summary_max_age_secs),
            max_samples: self.summary_max_samples,
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(
            path = %path.display(),
            subsystem = %config.subsystem,
            runtime = %config.runtime,
            "metrics configuration loaded"
        );
        Ok(config)
    }

    /// Check that the configuration produces valid series.
    pub fn validate(&self) -> Result<()> {
        if self.runtime.is_empty() {
            return Err(Error::Config("runtime prefix must not be empty".to_string()));
        }
        if self.label.is_empty() {
            return Err(Error::Config("label name must not be empty".to_string()));
        }
        if self.deprecated_version.is_empty() {
            return Err(Error::Config(
                "deprecated version must not be empty".to_string(),
            ));
        }
        histogram::validate_buckets(&self.latency_buckets)
            .map_err(|e| Error::Config(e.to_string()))?;
        self.summary_opts()
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(())
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            subsystem: DEFAULT_SUBSYSTEM.to_string(),
            runtime: DEFAULT_RUNTIME.to_string(),
            label: DEFAULT_LABEL.to_string(),
            deprecated_version: DEFAULT_DEPRECATED_VERSION.to_string(),
            latency_buckets: DEFAULT_BUCKETS.to_vec(),
            summary_objectives: DEFAULT_OBJECTIVES.to_vec(),
            summary_max_age_secs: DEFAULT_MAX_AGE_SECS,
            summary_max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}
