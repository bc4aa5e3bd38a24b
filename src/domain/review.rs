use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

use crate::error::SchedulerError;

/// Lowest quality that counts as a successful recall
pub const PASSING_QUALITY: u8 = 3;

/// Recall quality on the SM-2 0-5 scale.
///
/// 0 = blackout, 3 = correct but effortful, 5 = perfect immediate recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Quality(u8);

impl Quality {
  pub const MAX: u8 = 5;

  pub fn new(value: i64) -> Result<Self, SchedulerError> {
    if (0..=Self::MAX as i64).contains(&value) {
      Ok(Self(value as u8))
    } else {
      Err(SchedulerError::InvalidQuality(value))
    }
  }

  pub fn value(&self) -> u8 {
    self.0
  }

  pub fn is_pass(&self) -> bool {
    self.0 >= PASSING_QUALITY
  }
}

impl TryFrom<i64> for Quality {
  type Error = SchedulerError;

  fn try_from(value: i64) -> Result<Self, Self::Error> {
    Self::new(value)
  }
}

/// How sure the learner was of their answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
  Low,
  Medium,
  #[default]
  High,
}

impl Confidence {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
    }
  }
}

/// Unknown labels count as high confidence, matching how the quiz UI grades.
impl FromStr for Confidence {
  type Err = Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s {
      "low" => Self::Low,
      "medium" => Self::Medium,
      _ => Self::High,
    })
  }
}

/// Map a quiz answer onto the 0-5 quality scale.
pub fn quality_from_answer(is_correct: bool, confidence: Confidence) -> Quality {
  let value = match (is_correct, confidence) {
    (false, Confidence::Low) => 0,
    (false, _) => 1,
    (true, Confidence::Low) => 3,
    (true, Confidence::Medium) => 4,
    (true, Confidence::High) => 5,
  };
  Quality(value)
}

/// One answered item, as produced by the quiz UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEvent {
  pub item_id: String,
  pub quality: u8,
  pub reviewed_at: DateTime<Utc>,
}

impl ReviewEvent {
  pub fn new(item_id: impl Into<String>, quality: Quality) -> Self {
    Self {
      item_id: item_id.into(),
      quality: quality.value(),
      reviewed_at: Utc::now(),
    }
  }
}
