//! In-process store; state lives only as long as the value.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::StateStore;
use crate::domain::ReviewState;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    states: RwLock<HashMap<String, ReviewState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, ReviewState>>> {
        self.states.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, ReviewState>>> {
        self.states.write().map_err(|_| StoreError::Poisoned)
    }
}

impl StateStore for MemoryStore {
    fn get(&self, item_id: &str) -> StoreResult<Option<ReviewState>> {
        Ok(self.read()?.get(item_id).cloned())
    }

    fn set(&self, state: &ReviewState) -> StoreResult<()> {
        self.write()?.insert(state.item_id.clone(), state.clone());
        Ok(())
    }

    fn remove(&self, item_id: &str) -> StoreResult<()> {
        self.write()?.remove(item_id);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    fn snapshot(&self) -> StoreResult<Vec<ReviewState>> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn replace_all(&self, states: Vec<ReviewState>) -> StoreResult<()> {
        let mut map = self.write()?;
        *map = states.into_iter().map(|s| (s.item_id.clone(), s)).collect();
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }
}
