//! In-process usage parameter set
//!
//! Components living in the same process embed a `UsageParameterSet`, bump
//! its counters as they work, and register it with the [`SourceRegistry`].
//!
//! [`SourceRegistry`]: super::SourceRegistry

use super::MetricSource;
use crate::error::SourceError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Named usage counters owned by one component
#[derive(Debug, Default)]
pub struct UsageParameterSet {
    parameters: DashMap<String, AtomicU64>,
}

impl UsageParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set whose parameters exist up front, all at zero
    pub fn with_parameters<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = Self::new();
        for name in names {
            set.parameters.insert(name.into(), AtomicU64::new(0));
        }
        set
    }

    /// Add `by` to the parameter `name`, creating it if needed
    pub fn increment(&self, name: &str, by: u64) {
        if let Some(value) = self.parameters.get(name) {
            value.fetch_add(by, Ordering::Relaxed);
            return;
        }
        self.parameters
            .entry(name.to_string())
            .or_default()
            .fetch_add(by, Ordering::Relaxed);
    }

    /// Current value of `name`, if the parameter exists
    pub fn get(&self, name: &str) -> Option<u64> {
        self.parameters
            .get(name)
            .map(|value| value.load(Ordering::Relaxed))
    }
}

#[async_trait]
impl MetricSource for UsageParameterSet {
    async fn list_names(&self) -> Result<Vec<String>, SourceError> {
        Ok(self
            .parameters
            .iter()
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn read_value(&self, name: &str) -> Result<u64, SourceError> {
        self.get(name)
            .ok_or_else(|| SourceError::UnknownMetric(name.to_string()))
    }

    async fn reset(&self) -> Result<(), SourceError> {
        for entry in self.parameters.iter() {
            entry.value().store(0, Ordering::Relaxed);
        }
        Ok(())
    }
}
