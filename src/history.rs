use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::entry::WordEntry;
use crate::error::Result;
use crate::kv::KeyValueStore;
use crate::repository::WordRepository;

pub const MAX_HISTORY: usize = 7;
pub const HISTORY_KEY: &str = "dictionary_search_history";

/// Most-recent-first list of visited word ids, stored as a JSON array through
/// a [`KeyValueStore`]. Storage problems never surface as errors: a broken or
/// missing store reads as an empty history and writes are dropped.
pub struct HistoryTracker<S> {
    store: S,
    capacity: usize,
}

impl<S: KeyValueStore> HistoryTracker<S> {
    pub fn new(store: S) -> Self {
        Self::with_capacity(store, MAX_HISTORY)
    }

    pub fn with_capacity(store: S, capacity: usize) -> Self {
        Self { store, capacity }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn history(&self) -> Vec<String> {
        let raw = match self.store.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "search history unavailable");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(mut ids) => {
                let mut seen = HashSet::new();
                ids.retain(|id| seen.insert(id.clone()));
                ids.truncate(self.capacity);
                ids
            }
            Err(err) => {
                warn!(error = %err, "ignoring unreadable search history");
                Vec::new()
            }
        }
    }

    /// Moves `word_id` to the front, dropping any earlier occurrence and
    /// anything past capacity.
    pub fn record_visit(&self, word_id: &str) {
        let mut ids = self.history();
        ids.retain(|id| id != word_id);
        ids.insert(0, word_id.to_string());
        ids.truncate(self.capacity);
        let encoded = match serde_json::to_string(&ids) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(error = %err, "failed to encode search history");
                return;
            }
        };
        if let Err(err) = self.store.set(HISTORY_KEY, &encoded) {
            warn!(error = %err, word_id, "failed to persist search history");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.store.remove(HISTORY_KEY) {
            warn!(error = %err, "failed to clear search history");
        }
    }

    /// Looks the stored ids up in `repository`, keeping history order and
    /// skipping ids that no longer resolve.
    pub fn resolve<R>(&self, repository: &R) -> Result<Vec<WordEntry>>
    where
        R: WordRepository + ?Sized,
    {
        let ids = self.history();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut by_id: HashMap<String, WordEntry> = repository
            .get_by_ids(&ids)?
            .into_iter()
            .map(|entry| (entry.id.clone(), entry))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}
