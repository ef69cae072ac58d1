//! Central metrics registry.
//!
//! The registry is the collection point series are installed into. It keys
//! series by fully-qualified name, rejects identity collisions and renders
//! everything it holds in the Prometheus text format.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::desc::SeriesDesc;
use crate::error::{Error, Result};

/// A series that can be installed into a [`Registry`].
pub trait Collector: Send + Sync {
    /// Descriptor of the series.
    fn desc(&self) -> &SeriesDesc;

    /// Append the series in Prometheus text format.
    fn encode_text(&self, out: &mut String);
}

/// Registry of installed series.
#[derive(Default)]
pub struct Registry {
    collectors: DashMap<String, Arc<dyn Collector>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a series.
    ///
    /// Installing the same series object again is a no-op. Installing a
    /// different series under a name that is already taken fails with
    /// [`Error::AlreadyRegistered`].
    pub fn register(&self, collector: Arc<dyn Collector>) -> Result<()> {
        let name = collector.desc().fq_name().to_string();
        match self.collectors.entry(name) {
            Entry::Occupied(existing) => {
                if same_collector(existing.get(), &collector) {
                    tracing::debug!(series = %existing.key(), "series already installed");
                    Ok(())
                } else {
                    tracing::error!(series = %existing.key(), "series name collision");
                    Err(Error::AlreadyRegistered(existing.key().clone()))
                }
            }
            Entry::Vacant(slot) => {
                tracing::debug!(
                    series = %slot.key(),
                    kind = %collector.desc().kind(),
                    deprecated = collector.desc().is_deprecated(),
                    "installed series"
                );
                slot.insert(collector);
                Ok(())
            }
        }
    }

    /// Install a group of series, or none of them.
    ///
    /// Every name is checked before anything is inserted, so a collision
    /// leaves the registry as it was. A concurrent installer racing for the
    /// same names can still win between the check and the insert; that
    /// surfaces as [`Error::AlreadyRegistered`] from the insert.
    pub fn register_all(&self, collectors: &[Arc<dyn Collector>]) -> Result<()> {
        for collector in collectors {
            let name = collector.desc().fq_name();
            if let Some(existing) = self.collectors.get(name) {
                if !same_collector(existing.value(), collector) {
                    tracing::error!(series = %name, "series name collision");
                    return Err(Error::AlreadyRegistered(name.to_string()));
                }
            }
        }
        for collector in collectors {
            self.register(Arc::clone(collector))?;
        }
        Ok(())
    }

    /// Whether a series with this fully-qualified name is installed.
    pub fn contains(&self, fq_name: &str) -> bool {
        self.collectors.contains_key(fq_name)
    }

    /// Number of installed series.
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    /// Whether no series is installed.
    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Fully-qualified names of installed series, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collectors.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Export to Prometheus text format.
    ///
    /// Series are written in name order.
    pub fn to_prometheus(&self) -> String {
        let mut collectors: Vec<(String, Arc<dyn Collector>)> = self
            .collectors
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        collectors.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = String::new();
        for (_, collector) in collectors {
            collector.encode_text(&mut out);
        }
        out
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("series", &self.names())
            .finish()
    }
}

fn same_collector(a: &Arc<dyn Collector>, b: &Arc<dyn Collector>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Shared registry handle.
pub type SharedRegistry = Arc<Registry>;

/// Create a new shared registry.
pub fn new_shared_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}
