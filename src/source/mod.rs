//! Metric sources and the component directory
//!
//! A component exposes its usage counters through a [`MetricSource`]. The
//! polling task never talks to components directly: it asks a
//! [`ComponentDirectory`] for the current component list and resolves each id
//! to a source every cycle, since components come and go between cycles.

use crate::error::SourceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod http;
pub mod registry;
pub mod usage_set;

pub use http::HttpMetricSource;
pub use registry::SourceRegistry;
pub use usage_set::UsageParameterSet;

/// Identifier of a registered component
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A component's set of named usage counters
///
/// Values are non-negative and count usage since the last `reset`.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Names of every metric in the set
    async fn list_names(&self) -> Result<Vec<String>, SourceError>;

    /// Current value of `name`, without resetting it
    async fn read_value(&self, name: &str) -> Result<u64, SourceError>;

    /// Reset every metric in the set to zero
    async fn reset(&self) -> Result<(), SourceError>;
}

/// The host's view of registered components
#[async_trait]
pub trait ComponentDirectory: Send + Sync {
    /// Components registered right now
    async fn list_components(&self) -> Vec<ComponentId>;

    /// Resolve a component to its metric source
    ///
    /// `Ok(None)` means the component exposes no usage metrics, which is not
    /// an error.
    async fn lookup(&self, id: &ComponentId)
    -> Result<Option<Arc<dyn MetricSource>>, SourceError>;
}
