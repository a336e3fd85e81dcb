//! Health check endpoint
//!
//! Provides a simple health check for monitoring and load balancers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Polling loop status: "operational" or "degraded"
    pub polling_status: &'static str,
}

/// Health check handler
///
/// Returns 200 OK with the service status. Polling status is "degraded" once
/// the background polling task has stopped unexpectedly, since usage is no
/// longer collected from that point on.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let polling_status = if state.metrics().background_task_failures_count() > 0 {
        "degraded"
    } else {
        "operational"
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            polling_status,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::create_test_state;
    use crate::metrics::TaskFailure;

    #[tokio::test]
    async fn test_health_handler_returns_ok() {
        let state = create_test_state();
        let (status, Json(body)) = handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "OK");
        assert_eq!(body.polling_status, "operational");
    }

    #[tokio::test]
    async fn test_health_handler_shows_degraded_after_task_failure() {
        let state = create_test_state();
        state.metrics().background_task_failure(TaskFailure::Panic);

        let (status, Json(body)) = handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.polling_status, "degraded");
    }
}
