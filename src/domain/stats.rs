//! Aggregate statistics over all stored review states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{DEFAULT_EASE_FACTOR, ReviewState, Stage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_cards: usize,
    pub new_cards: usize,
    pub learning: usize,
    pub review: usize,
    pub mastered: usize,
    pub due_today: usize,
    pub average_ease_factor: f64,
    pub total_reviews: i64,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            total_cards: 0,
            new_cards: 0,
            learning: 0,
            review: 0,
            mastered: 0,
            due_today: 0,
            average_ease_factor: DEFAULT_EASE_FACTOR,
            total_reviews: 0,
        }
    }
}

impl Statistics {
    /// Fold a population of states into one summary, counting due items against `as_of`.
    pub fn collect<'a, I>(states: I, as_of: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a ReviewState>,
    {
        let mut stats = Self::default();
        let mut total_ease = 0.0;

        for state in states {
            stats.total_cards += 1;
            stats.total_reviews = stats.total_reviews.saturating_add(state.total_reviews);
            total_ease += state.ease_factor;

            match state.stage() {
                Stage::New => stats.new_cards += 1,
                Stage::Learning => stats.learning += 1,
                Stage::Review => stats.review += 1,
                Stage::Mastered => stats.mastered += 1,
            }

            if state.is_due(as_of) {
                stats.due_today += 1;
            }
        }

        if stats.total_cards > 0 {
            stats.average_ease_factor = total_ease / stats.total_cards as f64;
        }
        stats
    }

    /// Sum of the four stage buckets; always equals `total_cards`.
    pub fn bucket_total(&self) -> usize {
        self.new_cards + self.learning + self.review + self.mastered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn state(id: &str, repetitions: i64, ease: f64, reviews: i64, due_in_days: Option<i64>) -> ReviewState {
        let mut s = ReviewState::new(id);
        s.repetitions = repetitions;
        s.ease_factor = ease;
        s.total_reviews = reviews;
        s.next_review_at = due_in_days.map(|d| now() + Duration::days(d));
        s
    }

    #[test]
    fn test_empty_population() {
        let empty: Vec<ReviewState> = Vec::new();
        let stats = Statistics::collect(&empty, now());
        assert_eq!(stats, Statistics::default());
        assert_eq!(stats.average_ease_factor, 2.5);
    }

    #[test]
    fn test_buckets_partition_population() {
        let states: Vec<ReviewState> = (0..20)
            .map(|i| state(&format!("q{}", i), i % 9, 2.5, i, Some(1)))
            .collect();
        let stats = Statistics::collect(&states, now());

        assert_eq!(stats.total_cards, 20);
        assert_eq!(stats.bucket_total(), stats.total_cards);
        // repetitions cycle 0..=8
        assert_eq!(stats.new_cards, 3);
        assert_eq!(stats.learning, 5);
        assert_eq!(stats.review, 6);
        assert_eq!(stats.mastered, 6);
    }

    #[test]
    fn test_due_and_totals() {
        let states = vec![
            state("a", 0, 2.5, 0, None),
            state("b", 1, 2.6, 1, Some(0)),
            state("c", 2, 2.0, 2, Some(-3)),
            state("d", 4, 1.5, 6, Some(5)),
        ];
        let stats = Statistics::collect(&states, now());

        assert_eq!(stats.due_today, 3);
        assert_eq!(stats.total_reviews, 9);
        assert!((stats.average_ease_factor - 2.15).abs() < 1e-9);
    }

    #[test]
    fn test_total_reviews_saturates() {
        let states = vec![state("a", 3, 2.5, i64::MAX, None), state("b", 3, 2.5, 10, None)];
        let stats = Statistics::collect(&states, now());
        assert_eq!(stats.total_reviews, i64::MAX);
    }
}
