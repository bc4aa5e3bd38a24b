//! Application state shared by all HTTP handlers.

use std::sync::Arc;

use crate::srs::Scheduler;

#[derive(Clone)]
pub struct AppState {
    /// Carries its own store timeout; see `Scheduler::with_timeout`
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}
