use std::collections::HashSet;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{CreateOutcome, WordRepository, validate_batch};
use crate::entry::{NewEntry, WordEntry, normalize_word};
use crate::error::Result;
use crate::ranking::{SearchConfig, SearchHit, SearchStrategy};

/// Process-local repository. Entries are kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: RwLock<MemoryData>,
}

#[derive(Debug, Default)]
struct MemoryData {
    entries: Vec<WordEntry>,
    keys: HashSet<(String, String)>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WordRepository for MemoryRepository {
    fn create(&self, entries: &[NewEntry]) -> Result<CreateOutcome> {
        let batch = validate_batch(entries)?;
        let now = Utc::now();
        let mut guard = self.inner.write();
        let mut inserted = 0usize;
        for entry in batch {
            let key = (entry.word.clone(), entry.definition.clone());
            if !guard.keys.insert(key) {
                continue;
            }
            guard.entries.push(WordEntry {
                id: Uuid::new_v4().to_string(),
                word: entry.word,
                definition: entry.definition,
                created_at: now,
            });
            inserted += 1;
        }
        drop(guard);
        debug!(
            inserted,
            skipped = entries.len() - inserted,
            "stored entries in memory"
        );
        Ok(CreateOutcome { inserted })
    }

    fn search(&self, query: &str, config: &SearchConfig) -> Result<Vec<SearchHit>> {
        if normalize_word(query).is_empty() {
            return Ok(Vec::new());
        }
        let candidates = match config.strategy {
            SearchStrategy::PositionalSimilarity => self.inner.read().entries.clone(),
            SearchStrategy::SubstringMatch => self.list_all()?,
        };
        Ok(config.apply(query, &candidates))
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<WordEntry>> {
        let guard = self.inner.read();
        // Reversed first so the stable sort leaves later inserts ahead on ties.
        let mut rows: Vec<WordEntry> = guard.entries.iter().rev().cloned().collect();
        drop(guard);
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    fn list_all(&self) -> Result<Vec<WordEntry>> {
        let mut rows = self.inner.read().entries.clone();
        rows.sort_by(|a, b| {
            a.word
                .cmp(&b.word)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(rows)
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<WordEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let guard = self.inner.read();
        Ok(guard
            .entries
            .iter()
            .filter(|entry| wanted.contains(entry.id.as_str()))
            .cloned()
            .collect())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut guard = self.inner.write();
        let Some(position) = guard.entries.iter().position(|entry| entry.id == id) else {
            return Ok(false);
        };
        let removed = guard.entries.remove(position);
        guard.keys.remove(&(removed.word, removed.definition));
        Ok(true)
    }
}
