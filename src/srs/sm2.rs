use chrono::{DateTime, Duration, Utc};

use crate::domain::{MAX_INTERVAL_DAYS, MIN_EASE_FACTOR, Quality, ReviewState};
use crate::error::{Result, SchedulerError};

pub struct Sm2Result {
  pub ease_factor: f64,
  pub interval_days: i64,
  pub repetitions: i64,
}

/// EF' = max(1.3, EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)))
pub fn next_ease_factor(quality: Quality, current_ease_factor: f64) -> f64 {
  let miss = 5.0 - quality.value() as f64;
  let ease_delta = 0.1 - miss * (0.08 + miss * 0.02);
  (current_ease_factor + ease_delta).max(MIN_EASE_FACTOR)
}

/// Core SM-2 step. The interval grows by the ease factor *before* this
/// review adjusts it.
pub fn calculate_sm2(
  quality: Quality,
  current_ease_factor: f64,
  current_interval: i64,
  current_repetitions: i64,
) -> Sm2Result {
  let (new_interval, new_repetitions) = if quality.is_pass() {
    let interval = match current_repetitions {
      0 => 1,
      1 => 6,
      _ => ((current_interval as f64) * current_ease_factor).round() as i64,
    };
    (interval.min(MAX_INTERVAL_DAYS), current_repetitions.saturating_add(1))
  } else {
    // Failed review: relearn from day one
    (1, 0)
  };

  Sm2Result {
    ease_factor: next_ease_factor(quality, current_ease_factor),
    interval_days: new_interval,
    repetitions: new_repetitions,
  }
}

/// Apply one review to a state, producing the successor state.
///
/// Due times are plain UTC offsets of `interval` whole days from the review
/// instant, not local calendar-day arithmetic, so they never drift across DST.
///
/// Fails with `InvalidTimestamp` when the next due time falls outside the
/// representable date range.
pub fn apply_review(state: &ReviewState, quality: Quality, reviewed_at: DateTime<Utc>) -> Result<ReviewState> {
  let result = calculate_sm2(quality, state.ease_factor, state.interval, state.repetitions);

  let next_review_at = reviewed_at
    .checked_add_signed(Duration::days(result.interval_days))
    .ok_or(SchedulerError::InvalidTimestamp(reviewed_at))?;

  let correct_streak = if quality.is_pass() { state.correct_streak.saturating_add(1) } else { 0 };

  Ok(ReviewState {
    item_id: state.item_id.clone(),
    ease_factor: result.ease_factor,
    interval: result.interval_days,
    repetitions: result.repetitions,
    next_review_at: Some(next_review_at),
    last_reviewed_at: Some(reviewed_at),
    total_reviews: state.total_reviews.saturating_add(1),
    correct_streak,
  })
}
