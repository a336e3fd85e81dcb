//! HTTP handlers for the usagestat admin interface

use crate::counters::CounterRegistry;
use crate::metrics::Metrics;
use crate::poller::Poller;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

pub mod counters;
pub mod cycle;
pub mod health;
pub mod metrics;

/// Application state shared across all handlers
///
/// Wraps the poller, which owns the counter registry and the self-metrics.
/// Cloning is cheap (one Arc).
#[derive(Clone)]
pub struct AppState {
    poller: Arc<Poller>,
}

impl AppState {
    pub fn new(poller: Arc<Poller>) -> Self {
        Self { poller }
    }

    /// Get reference to the poller
    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Get reference to the counter registry
    pub fn counters(&self) -> &CounterRegistry {
        self.poller.counters()
    }

    /// Get reference to the self-metrics
    pub fn metrics(&self) -> &Metrics {
        self.poller.metrics()
    }
}

/// Build the admin router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .route("/counters", get(counters::list))
        .route("/counters/{name}", get(counters::get_one))
        .route("/cycle", post(cycle::trigger))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::counters::Snapshot;
    use crate::error::AppResult;
    use crate::reporter::Publisher;
    use crate::source::SourceRegistry;
    use async_trait::async_trait;

    pub(crate) struct NoopPublisher;

    #[async_trait]
    impl Publisher for NoopPublisher {
        async fn publish(&self, _snapshot: &Snapshot) -> AppResult<()> {
            Ok(())
        }
    }

    pub(crate) fn create_test_state_with(directory: Arc<SourceRegistry>) -> AppState {
        let poller = Poller::new(
            directory,
            Arc::new(CounterRegistry::new()),
            Arc::new(NoopPublisher),
            Metrics::new().expect("should create metrics"),
        );
        AppState::new(Arc::new(poller))
    }

    pub(crate) fn create_test_state() -> AppState {
        create_test_state_with(Arc::new(SourceRegistry::new()))
    }
}
