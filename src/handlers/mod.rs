//! JSON API over the scheduler.
//!
//! Every handler runs its scheduler call on the blocking pool. Store
//! timeouts surface as 504 and never leave a partial write behind.

pub mod admin;
pub mod reviews;

use axum::{
  Json, Router,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::SchedulerError;
use crate::srs::Scheduler;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/summary", get(summary))
    .route("/items/{item_id}", get(reviews::get_item))
    .route("/reviews", post(reviews::record_review))
    .route("/due", post(reviews::due_items))
    .route("/stats", get(admin::statistics))
    .route("/export", get(admin::export_state))
    .route("/import", post(admin::import_state))
    .route("/reset", post(admin::reset_all))
    .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
  Scheduler(SchedulerError),
  BadRequest(String),
  Internal,
}

impl From<SchedulerError> for ApiError {
  fn from(e: SchedulerError) -> Self {
    Self::Scheduler(e)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      Self::Scheduler(e) => {
        let status = match &e {
          e if e.is_precondition() => StatusCode::BAD_REQUEST,
          SchedulerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
          _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
          tracing::error!("Scheduler call failed: {}", e);
        }
        (status, e.to_string())
      }
      Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
      Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

/// Run a scheduler call on the blocking pool.
///
/// The scheduler enforces the store timeout itself and rolls back late
/// writes, so the handler waits for the call to settle instead of
/// abandoning it. A 504 therefore always means nothing was changed.
pub(crate) async fn run<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
  F: FnOnce(&Scheduler) -> crate::error::Result<T> + Send + 'static,
  T: Send + 'static,
{
  let scheduler = Arc::clone(&state.scheduler);

  match tokio::task::spawn_blocking(move || f(&scheduler)).await {
    Ok(result) => result.map_err(ApiError::from),
    Err(e) => {
      tracing::error!("Scheduler task panicked: {}", e);
      Err(ApiError::Internal)
    }
  }
}

// ============================================================================
// Overview
// ============================================================================

async fn health() -> Json<serde_json::Value> {
  Json(json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
  pub due_count: usize,
  pub total_cards: usize,
  pub next_review: Option<DateTime<Utc>>,
  /// Human-friendly form of `next_review`, e.g. "in 3 days"
  pub next_review_relative: Option<String>,
}

pub fn format_relative_time(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let duration = dt.signed_duration_since(now);

  let minutes = duration.num_minutes();
  let hours = duration.num_hours();
  let days = duration.num_days();

  if minutes < 1 {
    "now".to_string()
  } else if minutes < 60 {
    format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
  } else if hours < 24 {
    format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
  } else if days == 1 {
    "tomorrow".to_string()
  } else {
    format!("in {} days", days)
  }
}

async fn summary(State(state): State<AppState>) -> Result<Json<Summary>, ApiError> {
  let now = Utc::now();
  let (stats, next_review) = run(&state, move |s| {
    Ok((s.statistics_at(now)?, s.next_review_after(now)?))
  })
  .await?;

  Ok(Json(Summary {
    due_count: stats.due_today,
    total_cards: stats.total_cards,
    next_review,
    next_review_relative: next_review.map(|dt| format_relative_time(dt, now)),
  }))
}
