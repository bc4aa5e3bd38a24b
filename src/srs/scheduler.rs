//! Review scheduler: owns per-item state and answers due/statistics queries.
//!
//! Concurrency model:
//! - reviews of the same item are serialized by a per-item mutex
//! - reviews of different items run in parallel
//! - `reset_all` / `import_state` take the bulk lock exclusively, so a
//!   wholesale replace never lands in the middle of a review
//! - queries read owned snapshots from the store and take no locks here
//!
//! With a timeout set, every call runs against a deadline. A write that
//! finishes past its deadline is rolled back before `Timeout` is returned,
//! so a timed-out call never leaves a change behind.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use super::sm2::apply_review;
use crate::domain::{Quality, ReviewEvent, ReviewState, Statistics};
use crate::error::{Result, SchedulerError, StoreError};
use crate::store::StateStore;
use crate::store::json_file::parse_state_map;

/// A candidate item paired with its current state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueItem<I> {
  pub item: I,
  pub state: ReviewState,
}

/// Time budget for a single scheduler call, lock waits included
struct Deadline {
  started: Instant,
  limit: Option<Duration>,
}

impl Deadline {
  fn check(&self) -> Result<()> {
    match self.limit {
      Some(limit) if self.started.elapsed() > limit => Err(SchedulerError::Timeout(limit.as_millis() as u64)),
      _ => Ok(()),
    }
  }
}

pub struct Scheduler {
  store: Arc<dyn StateStore>,
  item_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
  bulk: RwLock<()>,
  timeout: Option<Duration>,
}

impl Scheduler {
  pub fn new(store: Arc<dyn StateStore>) -> Self {
    Self {
      store,
      item_locks: Mutex::new(HashMap::new()),
      bulk: RwLock::new(()),
      timeout: None,
    }
  }

  /// Bound every call by `timeout`; see the module docs for what happens on overrun.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn store(&self) -> &Arc<dyn StateStore> {
    &self.store
  }

  fn deadline(&self) -> Deadline {
    Deadline {
      started: Instant::now(),
      limit: self.timeout,
    }
  }

  fn item_lock(&self, item_id: &str) -> Result<Arc<Mutex<()>>> {
    let mut locks = self.item_locks.lock().map_err(|_| SchedulerError::LockPoisoned)?;
    Ok(locks.entry(item_id.to_string()).or_default().clone())
  }

  fn decode(item_id: &str, stored: Option<ReviewState>) -> ReviewState {
    match stored {
      Some(mut state) => {
        state.item_id = item_id.to_string();
        state.repaired()
      }
      None => ReviewState::new(item_id),
    }
  }

  fn load(&self, item_id: &str) -> Result<ReviewState> {
    Ok(Self::decode(item_id, self.store.get(item_id)?))
  }

  /// Stored state for `item_id`, or a default that is *not* persisted.
  pub fn get_state(&self, item_id: &str) -> Result<ReviewState> {
    let deadline = self.deadline();
    let state = self.load(item_id)?;
    deadline.check()?;
    Ok(state)
  }

  /// Record one review with a raw 0-5 quality.
  pub fn record_review(&self, item_id: &str, quality: u8, reviewed_at: DateTime<Utc>) -> Result<ReviewState> {
    let quality = Quality::new(quality as i64)?;
    self.record(item_id, quality, reviewed_at)
  }

  pub fn record_review_now(&self, item_id: &str, quality: u8) -> Result<ReviewState> {
    self.record_review(item_id, quality, Utc::now())
  }

  pub fn record_event(&self, event: &ReviewEvent) -> Result<ReviewState> {
    self.record_review(&event.item_id, event.quality, event.reviewed_at)
  }

  /// Apply a validated review and persist the result.
  ///
  /// The returned state is only produced after the store accepted the write.
  /// Any error, `Timeout` included, means the review was not recorded.
  pub fn record(&self, item_id: &str, quality: Quality, reviewed_at: DateTime<Utc>) -> Result<ReviewState> {
    let deadline = self.deadline();
    if item_id.is_empty() {
      return Err(SchedulerError::EmptyItemId);
    }

    let _bulk = self.bulk.read().map_err(|_| SchedulerError::LockPoisoned)?;
    let lock = self.item_lock(item_id)?;
    let _item = lock.lock().map_err(|_| SchedulerError::LockPoisoned)?;

    let stored = self.store.get(item_id)?;
    let current = Self::decode(item_id, stored.clone());
    let next = apply_review(&current, quality, reviewed_at)?;
    deadline.check()?;

    if let Err(e) = self.store.set(&next) {
      tracing::error!("Failed to persist review of '{}': {}", item_id, e);
      return Err(e.into());
    }

    if let Err(timeout) = deadline.check() {
      let rollback = match stored {
        Some(previous) => self.store.set(&previous),
        None => self.store.remove(item_id),
      };
      if let Err(e) = rollback {
        tracing::error!("Failed to roll back late review of '{}': {}", item_id, e);
        return Err(e.into());
      }
      tracing::warn!("Review of '{}' overran its deadline and was rolled back", item_id);
      return Err(timeout);
    }

    tracing::debug!(
      "Reviewed '{}' q={} -> interval={}d reps={} ef={:.2}",
      item_id,
      quality.value(),
      next.interval,
      next.repetitions,
      next.ease_factor
    );
    Ok(next)
  }

  /// Filter `candidates` down to the items due at `as_of`, keeping caller order.
  pub fn due_items<I, C>(&self, candidates: C, as_of: DateTime<Utc>) -> Result<Vec<DueItem<I>>>
  where
    I: AsRef<str>,
    C: IntoIterator<Item = I>,
  {
    let deadline = self.deadline();
    let mut due = Vec::new();
    for item in candidates {
      let state = self.load(item.as_ref())?;
      deadline.check()?;
      if state.is_due(as_of) {
        due.push(DueItem { item, state });
      }
    }
    Ok(due)
  }

  pub fn due_items_now<I, C>(&self, candidates: C) -> Result<Vec<DueItem<I>>>
  where
    I: AsRef<str>,
    C: IntoIterator<Item = I>,
  {
    self.due_items(candidates, Utc::now())
  }

  fn snapshot(&self) -> Result<Vec<ReviewState>> {
    let deadline = self.deadline();
    let states = self.store.snapshot()?;
    deadline.check()?;
    Ok(states.into_iter().map(ReviewState::repaired).collect())
  }

  /// Run a wholesale change, restoring the previous contents if it overran
  /// the deadline.
  fn bulk_change<F>(&self, deadline: &Deadline, change: F) -> Result<()>
  where
    F: FnOnce(&dyn StateStore) -> crate::error::StoreResult<()>,
  {
    let previous = match deadline.limit {
      Some(_) => Some(self.store.snapshot()?),
      None => None,
    };
    deadline.check()?;

    change(self.store.as_ref())?;

    if let Err(timeout) = deadline.check() {
      if let Some(previous) = previous {
        if let Err(e) = self.store.replace_all(previous) {
          tracing::error!("Failed to restore state after a late bulk change: {}", e);
          return Err(e.into());
        }
      }
      tracing::warn!("Bulk change overran its deadline and was rolled back");
      return Err(timeout);
    }
    Ok(())
  }

  pub fn statistics(&self) -> Result<Statistics> {
    self.statistics_at(Utc::now())
  }

  /// Statistics with `due_today` evaluated against `as_of`.
  pub fn statistics_at(&self, as_of: DateTime<Utc>) -> Result<Statistics> {
    Ok(Statistics::collect(&self.snapshot()?, as_of))
  }

  /// Earliest scheduled review strictly after `as_of`, if any item has one.
  pub fn next_review_after(&self, as_of: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    Ok(
      self
        .snapshot()?
        .into_iter()
        .filter_map(|s| s.next_review_at)
        .filter(|at| *at > as_of)
        .min(),
    )
  }

  /// Drop all review state. Safe to call repeatedly.
  pub fn reset_all(&self) -> Result<()> {
    let deadline = self.deadline();
    let _bulk = self.bulk.write().map_err(|_| SchedulerError::LockPoisoned)?;
    self.bulk_change(&deadline, |store| store.clear())?;
    self.item_locks.lock().map_err(|_| SchedulerError::LockPoisoned)?.clear();
    tracing::info!("Reset all review state");
    Ok(())
  }

  pub fn export_state(&self) -> Result<BTreeMap<String, ReviewState>> {
    Ok(self.snapshot()?.into_iter().map(|s| (s.item_id.clone(), s)).collect())
  }

  pub fn export_json(&self) -> Result<String> {
    let map = self.export_state()?;
    Ok(serde_json::to_string_pretty(&map).map_err(StoreError::from)?)
  }

  /// Replace all state with `states`. No merging: items absent from the
  /// import are gone afterwards. Returns the number of items stored.
  pub fn import_state<M>(&self, states: M) -> Result<usize>
  where
    M: IntoIterator<Item = (String, ReviewState)>,
  {
    let mut cleaned = Vec::new();
    for (item_id, mut state) in states {
      if item_id.is_empty() {
        tracing::warn!("Skipping imported review state with empty item id");
        continue;
      }
      state.item_id = item_id;
      cleaned.push(state.repaired());
    }

    let count = cleaned.len();
    let deadline = self.deadline();
    let _bulk = self.bulk.write().map_err(|_| SchedulerError::LockPoisoned)?;
    self.bulk_change(&deadline, |store| store.replace_all(cleaned))?;
    self.item_locks.lock().map_err(|_| SchedulerError::LockPoisoned)?.clear();
    tracing::info!("Imported {} review states", count);
    Ok(count)
  }

  /// Import from JSON text. A malformed payload leaves current state untouched.
  pub fn import_json(&self, json: &str) -> Result<usize> {
    let states = parse_state_map(json.as_bytes()).map_err(|e| SchedulerError::InvalidImport(e.to_string()))?;
    self.import_state(states)
  }
}
