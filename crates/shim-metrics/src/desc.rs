//! Series descriptors.
//!
//! A [`SeriesDesc`] is the immutable identity of a metric series: subsystem,
//! name, kind, help text, label names, stability level and an optional
//! deprecation version. Descriptors are built once and never change; only the
//! observations accumulated by the series they describe do.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of a metric series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Monotonically increasing counter.
    Counter,
    /// Fixed-bucket histogram.
    Histogram,
    /// Quantile-estimating summary.
    Summary,
}

impl MetricKind {
    /// Name used on the `# TYPE` line of the text format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stability level of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityLevel {
    /// May change or disappear without notice.
    #[default]
    Alpha,
    /// Covered by the deprecation policy.
    Stable,
}

impl fmt::Display for StabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StabilityLevel::Alpha => f.write_str("ALPHA"),
            StabilityLevel::Stable => f.write_str("STABLE"),
        }
    }
}

/// Immutable identity and metadata of a metric series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDesc {
    subsystem: String,
    name: String,
    fq_name: String,
    help: String,
    kind: MetricKind,
    label_names: Vec<String>,
    stability: StabilityLevel,
    deprecated_version: Option<String>,
}

impl SeriesDesc {
    /// Create a descriptor with no labels, ALPHA stability and no deprecation.
    pub fn new(
        subsystem: impl Into<String>,
        name: impl Into<String>,
        help: impl Into<String>,
        kind: MetricKind,
    ) -> Self {
        let subsystem = subsystem.into();
        let name = name.into();
        let fq_name = if subsystem.is_empty() {
            name.clone()
        } else {
            format!("{}_{}", subsystem, name)
        };
        Self {
            subsystem,
            name,
            fq_name,
            help: help.into(),
            kind,
            label_names: Vec::new(),
            stability: StabilityLevel::default(),
            deprecated_version: None,
        }
    }

    /// Add a label dimension.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label_names.push(label.into());
        self
    }

    /// Set the stability level.
    pub fn with_stability(mut self, stability: StabilityLevel) -> Self {
        self.stability = stability;
        self
    }

    /// Mark the series as deprecated since `version`.
    pub fn deprecated_since(mut self, version: impl Into<String>) -> Self {
        self.deprecated_version = Some(version.into());
        self
    }

    /// Subsystem the series belongs to.
    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    /// Series name within its subsystem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified name, `<subsystem>_<name>`.
    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    /// Help text as given at construction.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Series kind.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Label dimension names, in declaration order.
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Stability level.
    pub fn stability(&self) -> StabilityLevel {
        self.stability
    }

    /// Version after which the series may be removed, if deprecated.
    pub fn deprecated_version(&self) -> Option<&str> {
        self.deprecated_version.as_deref()
    }

    /// Whether the series is deprecated.
    pub fn is_deprecated(&self) -> bool {
        self.deprecated_version.is_some()
    }

    /// Help text as published: stability prefix, then deprecation notice.
    ///
    /// e.g. `[ALPHA] (Deprecated since 1.14.0) Latency in microseconds ...`
    pub fn rendered_help(&self) -> String {
        match &self.deprecated_version {
            Some(version) => format!(
                "[{}] (Deprecated since {}) {}",
                self.stability, version, self.help
            ),
            None => format!("[{}] {}", self.stability, self.help),
        }
    }

    /// Check naming rules and reserved labels for the descriptor's kind.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_metric_name(&self.fq_name) {
            return Err(Error::InvalidDescriptor(format!(
                "invalid series name {:?}",
                self.fq_name
            )));
        }
        if self.help.is_empty() {
            return Err(Error::InvalidDescriptor(format!(
                "series {} has empty help text",
                self.fq_name
            )));
        }
        if let Some(version) = &self.deprecated_version {
            if version.is_empty() {
                return Err(Error::InvalidDescriptor(format!(
                    "series {} has an empty deprecated version",
                    self.fq_name
                )));
            }
        }

        for (i, label) in self.label_names.iter().enumerate() {
            if !is_valid_label_name(label) {
                return Err(Error::InvalidDescriptor(format!(
                    "series {} has invalid label name {:?}",
                    self.fq_name, label
                )));
            }
            let reserved = match self.kind {
                MetricKind::Histogram => label == "le",
                MetricKind::Summary => label == "quantile",
                MetricKind::Counter => false,
            };
            if reserved {
                return Err(Error::InvalidDescriptor(format!(
                    "label {:?} is reserved for {} series",
                    label, self.kind
                )));
            }
            if self.label_names[..i].contains(label) {
                return Err(Error::InvalidDescriptor(format!(
                    "series {} declares label {:?} twice",
                    self.fq_name, label
                )));
            }
        }
        Ok(())
    }
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Owned label values used as the key of a labelled child series.
pub(crate) type LabelValues = Vec<String>;

pub(crate) fn label_key(desc: &SeriesDesc, values: &[&str]) -> LabelValues {
    debug_assert_eq!(
        values.len(),
        desc.label_names().len(),
        "label value count does not match labels of {}",
        desc.fq_name()
    );
    values.iter().map(|v| (*v).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fq_name() {
        let desc = SeriesDesc::new("kubelet", "docker_operations_total", "help", MetricKind::Counter);
        assert_eq!(desc.fq_name(), "kubelet_docker_operations_total");

        let bare = SeriesDesc::new("", "up", "help", MetricKind::Counter);
        assert_eq!(bare.fq_name(), "up");
    }

    #[test]
    fn test_rendered_help() {
        let desc = SeriesDesc::new("kubelet", "ops", "Cumulative ops.", MetricKind::Counter);
        assert_eq!(desc.rendered_help(), "[ALPHA] Cumulative ops.");

        let desc = desc
            .with_stability(StabilityLevel::Stable)
            .deprecated_since("1.14.0");
        assert!(desc.is_deprecated());
        assert_eq!(
            desc.rendered_help(),
            "[STABLE] (Deprecated since 1.14.0) Cumulative ops."
        );
    }

    #[test]
    fn test_validate_names() {
        let ok = SeriesDesc::new("kubelet", "ops", "help", MetricKind::Counter)
            .with_label("operation_type");
        assert!(ok.validate().is_ok());

        let bad_name = SeriesDesc::new("kubelet", "ops-total", "help", MetricKind::Counter);
        assert!(matches!(bad_name.validate(), Err(Error::InvalidDescriptor(_))));

        let bad_label = SeriesDesc::new("kubelet", "ops", "help", MetricKind::Counter)
            .with_label("__name");
        assert!(bad_label.validate().is_err());

        let dup_label = SeriesDesc::new("kubelet", "ops", "help", MetricKind::Counter)
            .with_label("operation_type")
            .with_label("operation_type");
        assert!(dup_label.validate().is_err());
    }

    #[test]
    fn test_reserved_labels() {
        let hist = SeriesDesc::new("kubelet", "lat", "help", MetricKind::Histogram).with_label("le");
        assert!(hist.validate().is_err());

        let summary =
            SeriesDesc::new("kubelet", "lat", "help", MetricKind::Summary).with_label("quantile");
        assert!(summary.validate().is_err());

        let counter = SeriesDesc::new("kubelet", "ops", "help", MetricKind::Counter).with_label("le");
        assert!(counter.validate().is_ok());
    }
}
