use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params, params_from_iter};
use tracing::{debug, info};
use uuid::Uuid;

use super::{CreateOutcome, WordRepository, validate_batch};
use crate::entry::{NewEntry, WordEntry, normalize_word};
use crate::error::Result;
use crate::ranking::{SearchConfig, SearchHit, SearchStrategy};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS words (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  id TEXT NOT NULL UNIQUE,
  word TEXT NOT NULL,
  definition TEXT NOT NULL,
  created_at TEXT NOT NULL,
  UNIQUE(word, definition)
);
CREATE INDEX IF NOT EXISTS idx_words_word ON words(word);
CREATE INDEX IF NOT EXISTS idx_words_created_at ON words(created_at);
";

const COLUMNS: &str = "id, word, definition, created_at";

/// SQLite-backed repository. The `(word, definition)` uniqueness constraint
/// is enforced by the table and conflicting rows are ignored on insert.
#[derive(Clone)]
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRepository").finish_non_exhaustive()
    }
}

impl SqliteRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened word database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn query_entries(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<WordEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl WordRepository for SqliteRepository {
    fn create(&self, entries: &[NewEntry]) -> Result<CreateOutcome> {
        let batch = validate_batch(entries)?;
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO words (id, word, definition, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for entry in &batch {
                inserted += stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    entry.word,
                    entry.definition,
                    created_at,
                ])?;
            }
        }
        tx.commit()?;
        debug!(
            inserted,
            skipped = batch.len() - inserted,
            "stored entries in sqlite"
        );
        Ok(CreateOutcome { inserted })
    }

    fn search(&self, query: &str, config: &SearchConfig) -> Result<Vec<SearchHit>> {
        let needle = normalize_word(query);
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        match config.strategy {
            SearchStrategy::SubstringMatch => {
                let rows = self.query_entries(
                    &format!(
                        "SELECT {COLUMNS} FROM words WHERE instr(word, ?1) > 0
                         ORDER BY word ASC, created_at ASC LIMIT ?2"
                    ),
                    params![needle, config.limit as i64],
                )?;
                Ok(rows
                    .into_iter()
                    .map(|entry| SearchHit { entry, score: None })
                    .collect())
            }
            SearchStrategy::PositionalSimilarity => {
                let candidates = self.query_entries(
                    &format!("SELECT {COLUMNS} FROM words ORDER BY seq ASC"),
                    params![],
                )?;
                Ok(config.apply(&needle, &candidates))
            }
        }
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<WordEntry>> {
        self.query_entries(
            &format!("SELECT {COLUMNS} FROM words ORDER BY created_at DESC, seq DESC LIMIT ?1"),
            params![limit as i64],
        )
    }

    fn list_all(&self) -> Result<Vec<WordEntry>> {
        self.query_entries(
            &format!("SELECT {COLUMNS} FROM words ORDER BY word ASC, created_at ASC"),
            params![],
        )
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<WordEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        self.query_entries(
            &format!("SELECT {COLUMNS} FROM words WHERE id IN ({placeholders})"),
            params_from_iter(ids.iter()),
        )
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM words WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<WordEntry> {
    let raw_created: String = row.get(3)?;
    let created_at = DateTime::parse_from_rfc3339(&raw_created)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err)))?;
    Ok(WordEntry {
        id: row.get(0)?,
        word: row.get(1)?,
        definition: row.get(2)?,
        created_at,
    })
}
