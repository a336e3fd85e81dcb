//! Manual polling trigger

use axum::{Json, extract::State};

use crate::handlers::AppState;
use crate::poller::CycleReport;

/// `POST /cycle`: run one polling cycle now
///
/// Waits for a scheduled cycle in progress before starting.
pub async fn trigger(State(state): State<AppState>) -> Json<CycleReport> {
    tracing::info!("Polling cycle triggered through admin interface");
    Json(state.poller().run_cycle().await)
}
