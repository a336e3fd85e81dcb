//! Read access to the aggregated usage counters

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use crate::counters::Snapshot;
use crate::error::{AppError, AppResult};
use crate::handlers::AppState;

/// A single counter total
#[derive(Debug, Serialize)]
pub struct CounterResponse {
    pub name: String,
    pub count: u64,
}

/// `GET /counters`: every counter, ordered by name
pub async fn list(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.counters().snapshot())
}

/// `GET /counters/{name}`: one counter, 404 if it was never updated
pub async fn get_one(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<CounterResponse>> {
    let count = state
        .counters()
        .get_count(&name)
        .ok_or_else(|| AppError::CounterNotFound(name.clone()))?;

    Ok(Json(CounterResponse { name, count }))
}
