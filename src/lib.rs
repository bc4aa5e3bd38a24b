pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod paths;
pub mod srs;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{Result, SchedulerError, StoreError};
pub use srs::Scheduler;
