use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
/// Upper bound on a scheduled interval (100 years)
pub const MAX_INTERVAL_DAYS: i64 = 36_500;

/// Per-item scheduling state.
///
/// Serializes to the exported record shape (`easeFactor`, `nextReview`, ...).
/// The item id is the key of the surrounding map, so it is not part of the
/// record itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewState {
  #[serde(skip)]
  pub item_id: String,
  #[serde(deserialize_with = "lenient_f64")]
  pub ease_factor: f64,
  /// Days until the next review
  pub interval: i64,
  /// Consecutive passes since the last failure
  pub repetitions: i64,
  #[serde(rename = "nextReview")]
  pub next_review_at: Option<DateTime<Utc>>,
  #[serde(rename = "lastReview")]
  pub last_reviewed_at: Option<DateTime<Utc>>,
  pub total_reviews: i64,
  pub correct_streak: i64,
}

impl Default for ReviewState {
  fn default() -> Self {
    Self {
      item_id: String::new(),
      ease_factor: DEFAULT_EASE_FACTOR,
      interval: 0,
      repetitions: 0,
      next_review_at: None,
      last_reviewed_at: None,
      total_reviews: 0,
      correct_streak: 0,
    }
  }
}

/// Learning stage bucket, derived from `repetitions`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  New,       // 0
  Learning,  // 1..3
  Review,    // 3..6
  Mastered,  // 6+
}

impl Stage {
  pub fn from_repetitions(repetitions: i64) -> Self {
    match repetitions {
      i64::MIN..=0 => Self::New,
      1..=2 => Self::Learning,
      3..=5 => Self::Review,
      _ => Self::Mastered,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::New => "new",
      Self::Learning => "learning",
      Self::Review => "review",
      Self::Mastered => "mastered",
    }
  }
}

impl ReviewState {
  /// Fresh state for an item that has never been reviewed.
  pub fn new(item_id: impl Into<String>) -> Self {
    Self {
      item_id: item_id.into(),
      ..Self::default()
    }
  }

  /// Never-reviewed items are always due; otherwise due once `next_review_at <= as_of`.
  pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
    match self.next_review_at {
      None => true,
      Some(next) => next <= as_of,
    }
  }

  pub fn stage(&self) -> Stage {
    Stage::from_repetitions(self.repetitions)
  }

  /// Normalize fields that fall outside their domains.
  ///
  /// Records come from stores and imports that may have been written by other
  /// tools, so nothing is trusted until it passes through here.
  pub fn repaired(mut self) -> Self {
    let mut fixed: Vec<&'static str> = Vec::new();

    if !self.ease_factor.is_finite() {
      self.ease_factor = DEFAULT_EASE_FACTOR;
      fixed.push("easeFactor");
    } else if self.ease_factor < MIN_EASE_FACTOR {
      self.ease_factor = MIN_EASE_FACTOR;
      fixed.push("easeFactor");
    }
    if self.interval < 0 {
      self.interval = 0;
      fixed.push("interval");
    } else if self.interval > MAX_INTERVAL_DAYS {
      self.interval = MAX_INTERVAL_DAYS;
      fixed.push("interval");
    }
    if self.repetitions < 0 {
      self.repetitions = 0;
      fixed.push("repetitions");
    }
    if self.total_reviews < 0 {
      self.total_reviews = 0;
      fixed.push("totalReviews");
    }
    if self.correct_streak < 0 {
      self.correct_streak = 0;
      fixed.push("correctStreak");
    }

    if !fixed.is_empty() {
      tracing::warn!("Repaired review state for '{}': {}", self.item_id, fixed.join(", "));
    }
    self
  }
}

// JSON.stringify writes NaN as null, so a broken ease factor shows up as null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
