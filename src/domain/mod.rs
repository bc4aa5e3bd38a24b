pub mod item;
pub mod review;
pub mod state;
pub mod stats;

pub use item::item_key;
pub use review::{Confidence, PASSING_QUALITY, Quality, ReviewEvent, quality_from_answer};
pub use state::{DEFAULT_EASE_FACTOR, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR, ReviewState, Stage};
pub use stats::Statistics;
