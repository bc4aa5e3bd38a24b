pub mod scheduler;
pub mod sm2;

pub use scheduler::{DueItem, Scheduler};
pub use sm2::{apply_review, calculate_sm2, Sm2Result};
