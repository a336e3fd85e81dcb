//! Prometheus metrics endpoint
//!
//! Exposes the service's own metrics in Prometheus text format for scraping.

use axum::{extract::State, http::StatusCode};

use crate::handlers::AppState;

/// Metrics handler for Prometheus scraping
///
/// # Response
///
/// - `200 OK` with metrics in Prometheus text format
/// - `500 Internal Server Error` if metrics collection fails
///
/// # Example
///
/// ```bash
/// curl http://localhost:9464/metrics
/// # HELP usagestat_cycles_total Total number of completed polling cycles
/// # TYPE usagestat_cycles_total counter
/// usagestat_cycles_total 42
/// ```
pub async fn handler(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics().gather() {
        Ok(output) => (StatusCode::OK, output),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics for Prometheus scraping");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {}", e),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::create_test_state;

    #[tokio::test]
    async fn test_metrics_handler_returns_prometheus_format() {
        let state = create_test_state();
        state.metrics().record_cycle(2.0);

        let (status, body) = handler(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# HELP"));
        assert!(body.contains("# TYPE"));
        assert!(body.contains("usagestat_cycles_total 1"));
    }

    #[tokio::test]
    async fn test_concurrent_metrics_scraping() {
        let state = create_test_state();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { handler(State(state)).await })
            })
            .collect();

        for handle in handles {
            let (status, _) = handle.await.expect("task should not panic");
            assert_eq!(status, StatusCode::OK);
        }
    }
}
