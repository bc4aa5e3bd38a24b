//! Whole-collection endpoints: statistics, backup and reset.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::json;
use std::collections::BTreeMap;

use super::{ApiError, run};
use crate::domain::{ReviewState, Statistics};
use crate::state::AppState;

/// GET /stats
pub async fn statistics(State(state): State<AppState>) -> Result<Json<Statistics>, ApiError> {
  let stats = run(&state, |s| s.statistics()).await?;
  Ok(Json(stats))
}

/// GET /export
///
/// Item id -> state map, the same shape `/import` accepts.
pub async fn export_state(
  State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, ReviewState>>, ApiError> {
  let exported = run(&state, |s| s.export_state()).await?;
  Ok(Json(exported))
}

/// POST /import
///
/// Takes the raw body so a malformed document is reported as an import
/// error rather than rejected by the JSON extractor.
pub async fn import_state(
  State(state): State<AppState>,
  body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
  let imported = run(&state, move |s| s.import_json(&body)).await?;
  Ok(Json(json!({ "imported": imported })))
}

/// POST /reset
pub async fn reset_all(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
  run(&state, |s| s.reset_all()).await?;
  Ok(StatusCode::NO_CONTENT)
}
