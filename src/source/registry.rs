//! Dispatch table from component id to metric source

use super::{ComponentDirectory, ComponentId, MetricSource};
use crate::error::SourceError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Component directory backed by explicit registrations
///
/// Components without usage metrics are registered with no source so they
/// still show up in `list_components`, and `lookup` reports them as `None`.
#[derive(Default)]
pub struct SourceRegistry {
    components: RwLock<BTreeMap<ComponentId, Option<Arc<dyn MetricSource>>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the metric source of a component
    pub async fn register(&self, id: impl Into<ComponentId>, source: Arc<dyn MetricSource>) {
        let id = id.into();
        let replaced = self
            .components
            .write()
            .await
            .insert(id.clone(), Some(source))
            .is_some();

        tracing::info!(component = %id, replaced, "Registered metric source");
    }

    /// Register a component that exposes no usage metrics
    pub async fn register_without_metrics(&self, id: impl Into<ComponentId>) {
        let id = id.into();
        tracing::debug!(component = %id, "Registered component without metrics");
        self.components.write().await.insert(id, None);
    }

    /// Remove a component; returns whether it was registered
    pub async fn unregister(&self, id: &ComponentId) -> bool {
        let removed = self.components.write().await.remove(id).is_some();
        if removed {
            tracing::info!(component = %id, "Unregistered component");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.components.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.components.read().await.is_empty()
    }
}

#[async_trait]
impl ComponentDirectory for SourceRegistry {
    async fn list_components(&self) -> Vec<ComponentId> {
        self.components.read().await.keys().cloned().collect()
    }

    async fn lookup(
        &self,
        id: &ComponentId,
    ) -> Result<Option<Arc<dyn MetricSource>>, SourceError> {
        Ok(self.components.read().await.get(id).cloned().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::UsageParameterSet;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = SourceRegistry::new();
        let set = Arc::new(UsageParameterSet::new());
        set.increment("calls", 4);
        registry.register("sip-ra", set).await;

        let source = registry
            .lookup(&ComponentId::from("sip-ra"))
            .await
            .unwrap()
            .expect("source should be registered");
        assert_eq!(source.read_value("calls").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_component_without_metrics_is_listed_but_resolves_to_none() {
        let registry = SourceRegistry::new();
        registry.register_without_metrics("http-client-ra").await;

        assert_eq!(
            registry.list_components().await,
            vec![ComponentId::from("http-client-ra")]
        );
        assert!(
            registry
                .lookup(&ComponentId::from("http-client-ra"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_unknown_component_resolves_to_none() {
        let registry = SourceRegistry::new();
        assert!(
            registry
                .lookup(&ComponentId::from("ghost"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_unregister_removes_component() {
        let registry = SourceRegistry::new();
        registry
            .register("sip-ra", Arc::new(UsageParameterSet::new()))
            .await;

        assert!(registry.unregister(&ComponentId::from("sip-ra")).await);
        assert!(!registry.unregister(&ComponentId::from("sip-ra")).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_components_is_sorted() {
        let registry = SourceRegistry::new();
        registry.register_without_metrics("b").await;
        registry.register_without_metrics("a").await;
        registry.register_without_metrics("c").await;

        let ids: Vec<String> = registry
            .list_components()
            .await
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(registry.len().await, 3);
    }
}
