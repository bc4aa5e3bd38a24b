//! Single-file JSON store.
//!
//! Keeps the whole state map in one JSON object, the same layout the browser
//! quiz exported under its `srs_data` key, so existing exports can be dropped
//! in as a store file. Every write rewrites the file via a temp file + rename.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{LogOnError, StateStore};
use crate::domain::ReviewState;
use crate::error::{StoreError, StoreResult};

pub struct JsonFileStore {
    path: PathBuf,
    states: Mutex<HashMap<String, ReviewState>>,
}

/// Parse a state map blob, setting each state's `item_id` from its key
pub fn parse_state_map(bytes: &[u8]) -> serde_json::Result<HashMap<String, ReviewState>> {
    let raw: HashMap<String, ReviewState> = serde_json::from_slice(bytes)?;
    Ok(raw
        .into_iter()
        .map(|(id, mut state)| {
            state.item_id = id.clone();
            (id, state)
        })
        .collect())
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A file that is not a valid state map is moved aside to `*.corrupt` and
    /// the store starts empty.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let states = match fs::read(&path) {
            Ok(bytes) => match parse_state_map(&bytes) {
                Ok(states) => states,
                Err(e) => {
                    tracing::warn!("Review state file {} is malformed ({}); starting empty", path.display(), e);
                    let aside = path.with_extension("json.corrupt");
                    fs::rename(&path, &aside)
                        .log_warn("Could not move corrupt state file aside");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Loaded {} review states from {}", states.len(), path.display());
        Ok(Self {
            path,
            states: Mutex::new(states),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, ReviewState>>> {
        self.states.lock().map_err(|_| StoreError::Poisoned)
    }

    fn persist(&self, states: &HashMap<String, ReviewState>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let ordered: BTreeMap<&str, &ReviewState> =
            states.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let bytes = serde_json::to_vec_pretty(&ordered)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, item_id: &str) -> StoreResult<Option<ReviewState>> {
        Ok(self.lock()?.get(item_id).cloned())
    }

    fn set(&self, state: &ReviewState) -> StoreResult<()> {
        let mut states = self.lock()?;
        let previous = states.insert(state.item_id.clone(), state.clone());

        if let Err(e) = self.persist(&states) {
            // Roll back so memory never claims a write the file doesn't have
            match previous {
                Some(prev) => states.insert(state.item_id.clone(), prev),
                None => states.remove(&state.item_id),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, item_id: &str) -> StoreResult<()> {
        let mut states = self.lock()?;
        let Some(previous) = states.remove(item_id) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&states) {
            states.insert(item_id.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn snapshot(&self) -> StoreResult<Vec<ReviewState>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn replace_all(&self, states: Vec<ReviewState>) -> StoreResult<()> {
        let replacement: HashMap<String, ReviewState> =
            states.into_iter().map(|s| (s.item_id.clone(), s)).collect();

        let mut current = self.lock()?;
        self.persist(&replacement)?;
        *current = replacement;
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let mut current = self.lock()?;
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        current.clear();
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.lock()?.len())
    }
}
