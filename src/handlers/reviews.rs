//! Per-item endpoints: read state, record a review, filter due items.

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{ApiError, run};
use crate::domain::{Confidence, Quality, ReviewState, quality_from_answer};
use crate::srs::DueItem;
use crate::state::AppState;

/// GET /items/{item_id}
pub async fn get_item(
  State(state): State<AppState>,
  Path(item_id): Path<String>,
) -> Result<Json<ReviewState>, ApiError> {
  let review_state = run(&state, move |s| s.get_state(&item_id)).await?;
  Ok(Json(review_state))
}

// ============================================================================
// Record Review
// ============================================================================

/// Either an explicit `quality`, or `isCorrect` plus optional `confidence`
/// for quiz front-ends that only know right/wrong.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
  pub item_id: String,
  pub quality: Option<i64>,
  pub is_correct: Option<bool>,
  pub confidence: Option<String>,
  /// Defaults to the server clock
  pub reviewed_at: Option<DateTime<Utc>>,
}

impl ReviewRequest {
  fn quality(&self) -> Result<Quality, ApiError> {
    match (self.quality, self.is_correct) {
      (Some(q), _) => Ok(Quality::new(q)?),
      (None, Some(is_correct)) => {
        let confidence = match self.confidence.as_deref() {
          Some(label) => label.parse::<Confidence>().unwrap_or_default(),
          None => Confidence::default(),
        };
        Ok(quality_from_answer(is_correct, confidence))
      }
      (None, None) => Err(ApiError::BadRequest(
        "either quality or isCorrect is required".to_string(),
      )),
    }
  }
}

/// POST /reviews
pub async fn record_review(
  State(state): State<AppState>,
  Json(request): Json<ReviewRequest>,
) -> Result<Json<ReviewState>, ApiError> {
  let quality = request.quality()?;
  let reviewed_at = request.reviewed_at.unwrap_or_else(Utc::now);
  let item_id = request.item_id;

  let updated = run(&state, move |s| s.record(&item_id, quality, reviewed_at)).await?;
  Ok(Json(updated))
}

// ============================================================================
// Due Items
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueRequest {
  pub items: Vec<String>,
  pub as_of: Option<DateTime<Utc>>,
}

/// POST /due
///
/// Returns the due subset of `items` in request order.
pub async fn due_items(
  State(state): State<AppState>,
  Json(request): Json<DueRequest>,
) -> Result<Json<Vec<DueItem<String>>>, ApiError> {
  let as_of = request.as_of.unwrap_or_else(Utc::now);
  let items = request.items;

  let due = run(&state, move |s| s.due_items(items, as_of)).await?;
  Ok(Json(due))
}
